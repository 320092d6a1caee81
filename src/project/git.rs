//! Git 仓库依赖来源
//!
//! 将 Git 仓库（GitHub 等）中的 Vyper 项目克隆为依赖。

use std::path::Path;
use std::process::Command;
use tracing::info;

use crate::error::{VyperError, VyperResult};

/// Git 仓库引用类型
#[derive(Debug, Clone, PartialEq)]
pub enum GitRef {
    /// 指定标签或分支
    Named(String),
    /// 指定 commit hash
    Rev(String),
    /// 默认分支
    DefaultBranch,
}

/// 从 Git URL 与依赖版本解析引用信息
///
/// 支持的格式:
/// - `https://github.com/user/repo` → 使用依赖版本作为标签，否则默认分支
/// - `https://github.com/user/repo?tag=v1.0.0` / `?branch=dev` → Named
/// - `https://github.com/user/repo?rev=abc123` → Rev
pub fn parse_git_url(
    url: &str,
    version: Option<&str>,
) -> (String, GitRef) {
    if let Some(idx) = url.find('?') {
        let base_url = url[..idx].to_string();
        let query = &url[idx + 1..];

        for param in query.split('&') {
            if let Some((key, value)) = param.split_once('=') {
                match key {
                    "tag" | "branch" => return (base_url, GitRef::Named(value.to_string())),
                    "rev" => return (base_url, GitRef::Rev(value.to_string())),
                    _ => {}
                }
            }
        }

        let git_ref = version
            .map(|v| GitRef::Named(v.to_string()))
            .unwrap_or(GitRef::DefaultBranch);
        (base_url, git_ref)
    } else {
        let git_ref = version
            .map(|v| GitRef::Named(v.to_string()))
            .unwrap_or(GitRef::DefaultBranch);
        (url.to_string(), git_ref)
    }
}

/// 克隆 Git 仓库到目标目录
///
/// 失败时删除目标目录。
pub fn clone_repo(
    url: &str,
    version: Option<&str>,
    dest: &Path,
) -> VyperResult<()> {
    let (base_url, git_ref) = parse_git_url(url, version);

    // 确保目标目录的父目录存在
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 如果已存在则删除
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }

    info!("Cloning '{}' into '{}'.", base_url, dest.display());

    let result = checkout(&base_url, &git_ref, dest);
    if result.is_err() && dest.exists() {
        let _ = std::fs::remove_dir_all(dest);
    }
    result
}

fn checkout(
    base_url: &str,
    git_ref: &GitRef,
    dest: &Path,
) -> VyperResult<()> {
    let mut cmd = Command::new("git");
    cmd.arg("clone");

    match git_ref {
        GitRef::Named(name) => {
            cmd.args(["--depth", "1", "--branch"]).arg(name);
        }
        // 任意 commit 需要完整历史
        GitRef::Rev(_) => {}
        GitRef::DefaultBranch => {
            cmd.args(["--depth", "1"]);
        }
    }

    cmd.arg(base_url).arg(dest);
    run_git(cmd, &format!("Failed to clone '{}'", base_url))?;

    if let GitRef::Rev(rev) = git_ref {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(dest).args(["checkout", "--detach"]).arg(rev);
        run_git(cmd, &format!("Failed to check out '{}' of '{}'", rev, base_url))?;
    }

    Ok(())
}

fn run_git(
    mut cmd: Command,
    context: &str,
) -> VyperResult<()> {
    let output = cmd
        .output()
        .map_err(|e| VyperError::DependencyNotFound(format!("Unable to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VyperError::DependencyNotFound(format!(
            "{}: {}",
            context,
            stderr.trim()
        )));
    }
    Ok(())
}
