//! Vyper 编译器版本管理
//!
//! 定位、列出、下载并调用 `vyper` 可执行文件。编译器本身是外部程序，
//! 通过 `--standard-json` 协议交互。

use base64ct::{Base64, Encoding};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{VyperError, VyperResult};
use crate::util::config::UserConfig;
use crate::version::Version;

/// GitHub 发布列表地址
pub const RELEASES_URL: &str = "https://api.github.com/repos/vyperlang/vyper/releases?per_page=100";

/// 覆盖安装目录的环境变量
pub const BINARY_PATH_ENV: &str = "VVM_BINARY_PATH";

/// GitHub 访问令牌环境变量
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

const THROTTLED: &str = "API rate limit exceeded";

/// 编译器工具链
///
/// 编译流程只通过该 trait 访问外部编译器，测试可以替换为假实现。
pub trait Toolchain: Send + Sync {
    /// `PATH` 上 `vyper` 的版本
    fn package_version(&self) -> Option<Version>;

    /// 已安装的版本，包版本在前，其余从新到旧
    fn installed_versions(&self) -> Vec<Version>;

    /// 当前平台可安装的版本，从新到旧
    fn available_versions(&self) -> VyperResult<Vec<Version>>;

    /// 安装指定版本
    fn install(
        &self,
        version: &Version,
    ) -> VyperResult<()>;

    /// 指定版本的可执行文件路径
    fn binary(
        &self,
        version: &Version,
    ) -> VyperResult<PathBuf>;

    /// 以 standard-JSON 模式调用编译器
    fn compile_standard(
        &self,
        version: &Version,
        input: &Value,
        base_path: Option<&Path>,
        cwd: &Path,
    ) -> VyperResult<Value>;
}

/// 可下载的发布
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub version: Version,
    pub url: String,
}

/// 基于 GitHub 发布与本地安装目录的工具链
#[derive(Debug)]
pub struct Vvm {
    install_dir: PathBuf,
    max_retries: u32,
    package_version: OnceCell<Option<Version>>,
    releases: OnceCell<Vec<Release>>,
}

impl Vvm {
    pub fn new(
        install_dir: PathBuf,
        max_retries: u32,
    ) -> Self {
        Vvm {
            install_dir,
            max_retries,
            package_version: OnceCell::new(),
            releases: OnceCell::new(),
        }
    }

    /// 安装目录优先级：`VVM_BINARY_PATH` > 用户配置 > `~/.vvm`
    pub fn from_user_config(config: &UserConfig) -> Self {
        let install_dir = std::env::var_os(BINARY_PATH_ENV)
            .map(PathBuf::from)
            .or_else(|| config.vvm.install_dir.clone())
            .unwrap_or_else(default_install_dir);
        Vvm::new(install_dir, config.vvm.max_retries)
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    fn vvm_binary(
        &self,
        version: &Version,
    ) -> PathBuf {
        let name = if cfg!(windows) {
            format!("vyper-{}.exe", version)
        } else {
            format!("vyper-{}", version)
        };
        self.install_dir.join(name)
    }

    /// 安装目录中的版本
    pub fn vvm_installed_versions(&self) -> Vec<Version> {
        let Ok(entries) = std::fs::read_dir(&self.install_dir) else {
            return Vec::new();
        };
        let mut versions: Vec<Version> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                let raw = name.strip_prefix("vyper-")?;
                let raw = raw.strip_suffix(".exe").unwrap_or(raw);
                Version::parse(raw).ok()
            })
            .collect();
        versions.sort();
        versions.reverse();
        versions
    }

    /// 可下载的发布（首次成功后缓存）
    pub fn releases(&self) -> VyperResult<&[Release]> {
        self.releases
            .get_or_try_init(|| self.fetch_releases_with_retries())
            .map(Vec::as_slice)
    }

    fn fetch_releases_with_retries(&self) -> VyperResult<Vec<Release>> {
        retry_throttled(self.max_retries, std::thread::sleep, fetch_releases)
    }
}

/// GitHub 限流时重试 `fetch`，每次等待时间增加一秒
fn retry_throttled<T>(
    max_retries: u32,
    mut sleep: impl FnMut(Duration),
    mut fetch: impl FnMut() -> VyperResult<T>,
) -> VyperResult<T> {
    let mut buffer = 1u64;
    let mut tries = 0u32;
    loop {
        match fetch() {
            Err(VyperError::Install(message)) if message.contains(THROTTLED) => {
                tries += 1;
                if tries >= max_retries {
                    return Err(VyperError::Install(message));
                }
                warn!(
                    "GitHub throttled requests. Retrying in '{}' seconds. Tries left={}",
                    buffer,
                    max_retries - tries
                );
                sleep(Duration::from_secs(buffer));
                buffer += 1;
            }
            other => return other,
        }
    }
}

impl Toolchain for Vvm {
    fn package_version(&self) -> Option<Version> {
        self.package_version
            .get_or_init(|| {
                let binary = find_on_path("vyper")?;
                binary_version(&binary).ok()
            })
            .clone()
    }

    fn installed_versions(&self) -> Vec<Version> {
        let mut versions: Vec<Version> = self.package_version().into_iter().collect();
        versions.extend(self.vvm_installed_versions());
        versions
    }

    fn available_versions(&self) -> VyperResult<Vec<Version>> {
        Ok(self.releases()?.iter().map(|r| r.version.clone()).collect())
    }

    fn install(
        &self,
        version: &Version,
    ) -> VyperResult<()> {
        let release = self
            .releases()
            .map_err(|e| VyperError::install_failed(version, e))?
            .iter()
            .find(|r| &r.version == version)
            .cloned()
            .ok_or_else(|| {
                VyperError::install_failed(version, "no release for this platform")
            })?;

        std::fs::create_dir_all(&self.install_dir)
            .map_err(|e| VyperError::install_failed(version, e))?;
        let target = self.vvm_binary(version);
        let partial = PathBuf::from(format!("{}.part", target.display()));

        info!("Installing Vyper version '{}'.", version);
        let output = Command::new("curl")
            .args(["-sSLf", "-o"])
            .arg(&partial)
            .arg(&release.url)
            .output()
            .map_err(|e| VyperError::install_failed(version, e))?;
        if !output.status.success() {
            let _ = std::fs::remove_file(&partial);
            return Err(VyperError::install_failed(
                version,
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        std::fs::rename(&partial, &target).map_err(|e| VyperError::install_failed(version, e))?;
        make_executable(&target).map_err(|e| VyperError::install_failed(version, e))?;

        match binary_version(&target) {
            Ok(found) if found.release() == version.release() => {
                debug!("Installed '{}'.", target.display());
                Ok(())
            }
            Ok(found) => {
                let _ = std::fs::remove_file(&target);
                Err(VyperError::install_failed(
                    version,
                    format!("downloaded binary reports version '{}'", found),
                ))
            }
            Err(e) => {
                let _ = std::fs::remove_file(&target);
                Err(VyperError::install_failed(version, e))
            }
        }
    }

    fn binary(
        &self,
        version: &Version,
    ) -> VyperResult<PathBuf> {
        if self.package_version().as_ref() == Some(version) {
            if let Some(path) = find_on_path("vyper") {
                return Ok(path);
            }
        }
        let path = self.vvm_binary(version);
        if path.is_file() {
            Ok(path)
        } else {
            Err(VyperError::Install(format!(
                "Vyper version '{}' is not installed.",
                version
            )))
        }
    }

    fn compile_standard(
        &self,
        version: &Version,
        input: &Value,
        base_path: Option<&Path>,
        cwd: &Path,
    ) -> VyperResult<Value> {
        let binary = self.binary(version)?;
        run_standard_json(&binary, input, base_path, cwd)
    }
}

/// 默认安装目录 `~/.vvm`
pub fn default_install_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".vvm")
}

/// 在 `PATH` 中查找可执行文件
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let file_name = if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    };
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

/// 运行 `<binary> --version` 并解析版本（去掉 `+commit...` 后缀）
pub fn binary_version(binary: &Path) -> VyperResult<Version> {
    let output = Command::new(binary).arg("--version").output()?;
    if !output.status.success() {
        return Err(VyperError::Install(format!(
            "'{} --version' failed: {}",
            binary.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// 解析 `--version` 输出，例如 `0.4.0+commit.e9db8d9`
pub fn parse_version_output(output: &str) -> VyperResult<Version> {
    let line = output.lines().next().unwrap_or_default().trim();
    let raw = line.split('+').next().unwrap_or_default();
    Version::parse(raw)
}

/// 当前平台发布资产的后缀
pub fn platform_suffix() -> &'static str {
    if cfg!(target_os = "windows") {
        ".windows.exe"
    } else if cfg!(target_os = "macos") {
        ".darwin"
    } else {
        ".linux"
    }
}

fn fetch_releases() -> VyperResult<Vec<Release>> {
    let mut cmd = Command::new("curl");
    cmd.args(["-sSL", "-H", "Accept: application/vnd.github+json"]);
    if let Ok(token) = std::env::var(GITHUB_TOKEN_ENV) {
        let auth = Base64::encode_string(token.as_bytes());
        cmd.arg("-H").arg(format!("Authorization: Basic {}", auth));
    }
    cmd.arg(RELEASES_URL);

    let output = cmd
        .output()
        .map_err(|e| VyperError::Install(format!("Unable to query GitHub releases: {}", e)))?;
    if !output.status.success() {
        return Err(VyperError::Install(format!(
            "Unable to query GitHub releases: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let body: Value = serde_json::from_slice(&output.stdout)?;
    parse_releases(&body, platform_suffix())
}

/// 从 GitHub 发布列表中提取带有当前平台资产的版本（从新到旧）
pub fn parse_releases(
    body: &Value,
    suffix: &str,
) -> VyperResult<Vec<Release>> {
    let Some(items) = body.as_array() else {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unexpected response");
        return Err(VyperError::Install(format!("GitHub: {}", message)));
    };

    let mut releases: Vec<Release> = items
        .iter()
        .filter_map(|release| {
            let tag = release.get("tag_name")?.as_str()?;
            let version = Version::parse(tag.trim_start_matches('v')).ok()?;
            let url = release
                .get("assets")?
                .as_array()?
                .iter()
                .find(|asset| {
                    asset
                        .get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| name.ends_with(suffix))
                })?
                .get("browser_download_url")?
                .as_str()?
                .to_string();
            Some(Release { version, url })
        })
        .collect();

    releases.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(releases)
}

/// 执行 `--standard-json` 编译
pub fn run_standard_json(
    binary: &Path,
    input: &Value,
    base_path: Option<&Path>,
    cwd: &Path,
) -> VyperResult<Value> {
    let mut cmd = Command::new(binary);
    cmd.arg("--standard-json");
    if let Some(base) = base_path {
        cmd.arg("-p").arg(base);
    }
    let mut child = cmd
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // 编译器可能提前退出，写入失败时仍以其 stderr 为准
    let payload = serde_json::to_string(input)?;
    let write_result = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(payload.as_bytes()),
        None => Ok(()),
    };
    let output = child.wait_with_output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        return Err(VyperError::Compile(message));
    }
    write_result?;

    let result: Value = serde_json::from_slice(&output.stdout)?;
    check_standard_errors(&result)?;
    Ok(result)
}

/// 将 `errors` 中 severity 为 error 的条目转为编译错误
pub fn check_standard_errors(result: &Value) -> VyperResult<()> {
    let Some(errors) = result.get("errors").and_then(Value::as_array) else {
        return Ok(());
    };
    let messages: Vec<String> = errors
        .iter()
        .filter(|e| e.get("severity").and_then(Value::as_str) == Some("error"))
        .filter_map(|e| {
            e.get("formattedMessage")
                .or_else(|| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(VyperError::Compile(messages.join("\n")))
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_version_output() {
        let v = parse_version_output("0.4.0+commit.e9db8d9\n").unwrap();
        assert_eq!(v.to_string(), "0.4.0");
        let v = parse_version_output("0.4.0rc6").unwrap();
        assert!(v.is_prerelease());
        assert!(parse_version_output("").is_err());
    }

    #[test]
    fn test_parse_releases_filters_platform() {
        let body = json!([
            {
                "tag_name": "v0.3.10",
                "assets": [
                    {"name": "vyper.0.3.10+commit.91361694.linux", "browser_download_url": "https://x/linux-0310"},
                    {"name": "vyper.0.3.10+commit.91361694.darwin", "browser_download_url": "https://x/darwin-0310"}
                ]
            },
            {
                "tag_name": "v0.4.0",
                "assets": [
                    {"name": "vyper.0.4.0+commit.e9db8d9f.linux", "browser_download_url": "https://x/linux-040"}
                ]
            },
            {"tag_name": "v0.1.0-beta.1", "assets": []}
        ]);

        let releases = parse_releases(&body, ".linux").unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].version.to_string(), "0.4.0");
        assert_eq!(releases[1].url, "https://x/linux-0310");

        let releases = parse_releases(&body, ".darwin").unwrap();
        assert_eq!(releases.len(), 1);
    }

    #[test]
    fn test_parse_releases_error_body() {
        let body = json!({"message": "API rate limit exceeded for 1.2.3.4."});
        let err = parse_releases(&body, ".linux").unwrap_err();
        assert!(err.to_string().contains(THROTTLED));
    }

    #[test]
    fn test_check_standard_errors() {
        let ok = json!({"errors": [{"severity": "warning", "message": "meh"}]});
        assert!(check_standard_errors(&ok).is_ok());

        let bad = json!({"errors": [
            {"severity": "error", "formattedMessage": "line 1: bad"},
            {"severity": "error", "message": "line 2: worse"}
        ]});
        let err = check_standard_errors(&bad).unwrap_err();
        assert!(matches!(err, VyperError::Compile(_)));
        assert_eq!(err.to_string(), "line 1: bad\nline 2: worse");
    }

    #[test]
    fn test_vvm_installed_versions_sorted() {
        let tmp = TempDir::new().unwrap();
        for name in ["vyper-0.3.7", "vyper-0.4.0", "vyper-0.2.16", "notes.txt"] {
            std::fs::write(tmp.path().join(name), "").unwrap();
        }
        let vvm = Vvm::new(tmp.path().to_path_buf(), 10);
        let versions: Vec<String> = vvm
            .vvm_installed_versions()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(versions, vec!["0.4.0", "0.3.7", "0.2.16"]);
    }

    #[test]
    fn test_binary_not_installed() {
        let tmp = TempDir::new().unwrap();
        let vvm = Vvm::new(tmp.path().to_path_buf(), 10);
        let version = Version::parse("0.1.0b17").unwrap();
        assert!(matches!(vvm.binary(&version), Err(VyperError::Install(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_standard_json_with_script() {
        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("fake-vyper");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat > /dev/null\necho '{\"contracts\": {}, \"sources\": {}}'\n",
        )
        .unwrap();
        make_executable(&script).unwrap();

        let result = run_standard_json(&script, &json!({"language": "Vyper"}), None, tmp.path())
            .unwrap();
        assert_eq!(result["contracts"], json!({}));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_standard_json_failure_relays_stderr() {
        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("fake-vyper");
        std::fs::write(
            &script,
            "#!/bin/sh\ncat > /dev/null\necho 'StructureException: bad' >&2\nexit 1\n",
        )
        .unwrap();
        make_executable(&script).unwrap();

        let err = run_standard_json(&script, &json!({}), None, tmp.path()).unwrap_err();
        assert_eq!(err.to_string(), "StructureException: bad");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_standard_json_early_exit_relays_stderr() {
        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("fake-vyper");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'vyper: unrecognized arguments: -p' >&2\nexit 2\n",
        )
        .unwrap();
        make_executable(&script).unwrap();

        let content = "x: uint256\n".repeat(200_000);
        let input = json!({"language": "Vyper", "sources": {"big.vy": {"content": content}}});
        let err = run_standard_json(&script, &input, Some(tmp.path()), tmp.path()).unwrap_err();
        assert!(matches!(err, VyperError::Compile(_)));
        assert_eq!(err.to_string(), "vyper: unrecognized arguments: -p");
    }

    fn throttled() -> VyperError {
        VyperError::Install("GitHub: API rate limit exceeded for 1.2.3.4.".to_string())
    }

    #[test]
    fn test_retry_throttled_then_success() {
        let mut sleeps = Vec::new();
        let mut calls = 0;
        let result = retry_throttled(
            10,
            |d| sleeps.push(d.as_secs()),
            || {
                calls += 1;
                if calls <= 3 {
                    Err(throttled())
                } else {
                    Ok(calls)
                }
            },
        );
        assert_eq!(result.unwrap(), 4);
        assert_eq!(sleeps, vec![1, 2, 3]);
    }

    #[test]
    fn test_retry_throttled_gives_up() {
        let mut sleeps = Vec::new();
        let mut calls = 0;
        let result: VyperResult<()> = retry_throttled(
            3,
            |d| sleeps.push(d.as_secs()),
            || {
                calls += 1;
                Err(throttled())
            },
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains(THROTTLED));
        assert_eq!(calls, 3);
        assert_eq!(sleeps, vec![1, 2]);
    }

    #[test]
    fn test_retry_other_error_returned_at_once() {
        let mut sleeps = Vec::new();
        let mut calls = 0;
        let result: VyperResult<()> = retry_throttled(
            10,
            |d| sleeps.push(d.as_secs()),
            || {
                calls += 1;
                Err(VyperError::Install("Unable to query GitHub releases: offline".to_string()))
            },
        );
        assert_eq!(result.unwrap_err().to_string(), "Unable to query GitHub releases: offline");
        assert_eq!(calls, 1);
        assert!(sleeps.is_empty());
    }
}
