#[path = "integration/cli.rs"]
mod cli;
#[path = "integration/flatten.rs"]
mod flatten;
