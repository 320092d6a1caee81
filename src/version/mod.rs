//! Vyper 版本号与版本约束
//!
//! Vyper 的发布版本遵循 PEP 440 风格，例如 `0.3.10`、`0.4.0rc6`、`0.3.10b1`。
//!
//! 支持以下版本约束格式（逗号分隔，全部满足）:
//! - `==0.3.10` — 精确版本
//! - `==0.3.*`  — 前缀匹配
//! - `!=0.3.8`  — 排除
//! - `>=0.3.0`, `>0.3.0`, `<=0.4.0`, `<0.4.0`
//! - `~=0.3.0`  — 兼容版本 (>=0.3.0, ==0.3.*)
//! - `===0.3.10` — 字符串精确匹配

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{VyperError, VyperResult};

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^
        (\d+)(?:\.(\d+))?(?:\.(\d+))?
        (?:[-_.]?(a|alpha|b|beta|rc|c|pre|preview)[-_.]?(\d+)?)?
        (?:[-_.]?(?:post|rev|r)[-_.]?(\d+)?)?
        (?:[-_.]?dev[-_.]?(\d+)?)?
        $",
    )
    .expect("version pattern is valid")
});

/// 预发布阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    /// alpha (`a`)
    Alpha,
    /// beta (`b`)
    Beta,
    /// release candidate (`rc`)
    Rc,
}

impl PreKind {
    fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "a" | "alpha" => PreKind::Alpha,
            "b" | "beta" => PreKind::Beta,
            _ => PreKind::Rc,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PreKind::Alpha => "a",
            PreKind::Beta => "b",
            PreKind::Rc => "rc",
        }
    }
}

/// 编译器版本号
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    /// 主版本号
    pub major: u64,
    /// 次版本号
    pub minor: u64,
    /// 补丁版本号
    pub patch: u64,
    /// 预发布标签 (如 rc6, b1)
    pub pre: Option<(PreKind, u64)>,
    /// post 版本号
    pub post: Option<u64>,
    /// dev 版本号
    pub dev: Option<u64>,
}

impl Version {
    /// 创建新的版本号
    pub fn new(
        major: u64,
        minor: u64,
        patch: u64,
    ) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: None,
            post: None,
            dev: None,
        }
    }

    /// 创建带预发布标签的版本号
    pub fn with_pre(
        major: u64,
        minor: u64,
        patch: u64,
        kind: PreKind,
        number: u64,
    ) -> Self {
        Version {
            pre: Some((kind, number)),
            ..Version::new(major, minor, patch)
        }
    }

    /// 解析版本字符串
    ///
    /// 支持格式: `0.3.10`, `v0.3.10`, `0.4.0rc6`, `0.3.10+commit.9136169`, `0.3`
    pub fn parse(s: &str) -> VyperResult<Self> {
        Self::parse_with_len(s).map(|(v, _)| v)
    }

    /// 解析版本字符串，同时返回写出的数字段数量（用于前缀匹配）
    fn parse_with_len(s: &str) -> VyperResult<(Self, usize)> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        // 去掉本地版本标签（如 `+commit.abc`）
        let public = match trimmed.find('+') {
            Some(idx) => &trimmed[..idx],
            None => trimmed,
        };

        let caps = VERSION_PATTERN
            .captures(public)
            .ok_or_else(|| VyperError::InvalidVersion(s.to_string()))?;

        let number = |idx: usize| -> VyperResult<Option<u64>> {
            caps.get(idx)
                .map(|m| {
                    m.as_str()
                        .parse::<u64>()
                        .map_err(|_| VyperError::InvalidVersion(s.to_string()))
                })
                .transpose()
        };

        let major = number(1)?.unwrap_or(0);
        let minor = number(2)?;
        let patch = number(3)?;
        let release_len = 1 + minor.is_some() as usize + patch.is_some() as usize;

        let pre = match caps.get(4) {
            Some(tag) => Some((PreKind::from_tag(tag.as_str()), number(5)?.unwrap_or(0))),
            None => None,
        };

        let post = if public.to_ascii_lowercase().contains("post")
            || caps.get(6).is_some()
        {
            Some(number(6)?.unwrap_or(0))
        } else {
            None
        };

        let dev = if public.to_ascii_lowercase().contains("dev") {
            Some(number(7)?.unwrap_or(0))
        } else {
            None
        };

        Ok((
            Version {
                major,
                minor: minor.unwrap_or(0),
                patch: patch.unwrap_or(0),
                pre,
                post,
                dev,
            },
            release_len,
        ))
    }

    /// 数字段 `[major, minor, patch]`
    pub fn release(&self) -> [u64; 3] {
        [self.major, self.minor, self.patch]
    }

    /// 不含预发布等标签的版本字符串
    pub fn base_version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// 是否为预发布版本（包括 dev 版本）
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// 是否为正式版本
    pub fn is_final(&self) -> bool {
        self.pre.is_none() && self.dev.is_none() && self.post.is_none()
    }

    fn sort_key(&self) -> (u64, u64, u64, (u8, u8, u64), Option<u64>, (bool, u64)) {
        let pre_key = match (self.pre, self.post, self.dev) {
            // 仅有 dev 的版本排在所有预发布版本之前
            (None, None, Some(_)) => (0, 0, 0),
            (Some((kind, n)), _, _) => (1, kind as u8, n),
            _ => (2, 0, 0),
        };
        let dev_key = match self.dev {
            Some(n) => (false, n),
            None => (true, 0),
        };
        (self.major, self.minor, self.patch, pre_key, self.post, dev_key)
    }
}

impl Ord for Version {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some((kind, n)) = self.pre {
            write!(f, "{}{}", kind.as_str(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VyperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// 版本比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `~=`
    Compatible,
    /// `===`
    Arbitrary,
}

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Gte => ">=",
            Op::Gt => ">",
            Op::Lte => "<=",
            Op::Lt => "<",
            Op::Compatible => "~=",
            Op::Arbitrary => "===",
        }
    }
}

/// 单个版本约束
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Specifier {
    op: Op,
    version: Version,
    /// 写出的数字段数量
    release_len: usize,
    /// `==0.3.*` 形式
    wildcard: bool,
    /// 原始版本文本
    raw: String,
}

impl Specifier {
    fn parse(s: &str) -> VyperResult<Self> {
        let s = s.trim();
        let invalid = || VyperError::InvalidSpecifier(s.to_string());

        // 顺序很重要：较长的运算符优先
        let ops = [
            ("===", Op::Arbitrary),
            ("~=", Op::Compatible),
            ("==", Op::Eq),
            ("!=", Op::Ne),
            (">=", Op::Gte),
            ("<=", Op::Lte),
            (">", Op::Gt),
            ("<", Op::Lt),
        ];
        let (op, rest) = ops
            .iter()
            .find_map(|(prefix, op)| s.strip_prefix(prefix).map(|rest| (*op, rest.trim())))
            .ok_or_else(invalid)?;

        if rest.is_empty() {
            return Err(invalid());
        }

        if op == Op::Arbitrary {
            let version = Version::parse(rest).map_err(|_| invalid())?;
            return Ok(Specifier {
                op,
                version,
                release_len: 3,
                wildcard: false,
                raw: rest.to_string(),
            });
        }

        let (text, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) if matches!(op, Op::Eq | Op::Ne) => (prefix, true),
            Some(_) => return Err(invalid()),
            None => (rest, false),
        };

        let (version, release_len) = Version::parse_with_len(text).map_err(|_| invalid())?;
        if wildcard && !version.is_final() {
            return Err(invalid());
        }
        if op == Op::Compatible && release_len < 2 {
            return Err(invalid());
        }

        Ok(Specifier {
            op,
            version,
            release_len,
            wildcard,
            raw: rest.to_string(),
        })
    }

    fn prefix_matches(
        &self,
        version: &Version,
        len: usize,
    ) -> bool {
        version.release()[..len] == self.version.release()[..len]
    }

    /// 是否显式允许预发布版本
    fn allows_prereleases(&self) -> bool {
        matches!(
            self.op,
            Op::Eq | Op::Gte | Op::Lte | Op::Compatible | Op::Arbitrary
        ) && self.version.is_prerelease()
    }

    fn matches(
        &self,
        version: &Version,
    ) -> bool {
        match self.op {
            Op::Eq if self.wildcard => self.prefix_matches(version, self.release_len),
            Op::Eq => version == &self.version,
            Op::Ne if self.wildcard => !self.prefix_matches(version, self.release_len),
            Op::Ne => version != &self.version,
            Op::Gte => version >= &self.version,
            Op::Lte => version <= &self.version,
            Op::Gt => {
                version > &self.version
                    && !(version.post.is_some()
                        && self.version.post.is_none()
                        && version.release() == self.version.release())
            }
            Op::Lt => {
                version < &self.version
                    && !(version.is_prerelease()
                        && !self.version.is_prerelease()
                        && version.release() == self.version.release())
            }
            Op::Compatible => {
                version >= &self.version
                    && self.prefix_matches(version, self.release_len - 1)
            }
            Op::Arbitrary => version.to_string() == self.raw,
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.raw)
    }
}

/// 版本约束集合
///
/// 表示一组版本约束的组合，所有约束必须同时满足。空集合匹配任意正式版本。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecifierSet {
    specifiers: Vec<Specifier>,
}

impl SpecifierSet {
    /// 解析逗号分隔的版本约束
    pub fn parse(s: &str) -> VyperResult<Self> {
        let specifiers = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Specifier::parse)
            .collect::<VyperResult<Vec<_>>>()?;
        Ok(SpecifierSet { specifiers })
    }

    /// 是否没有任何约束
    pub fn is_empty(&self) -> bool {
        self.specifiers.is_empty()
    }

    fn allows_prereleases(&self) -> bool {
        self.specifiers.iter().any(Specifier::allows_prereleases)
    }

    fn matches_all(
        &self,
        version: &Version,
    ) -> bool {
        self.specifiers.iter().all(|s| s.matches(version))
    }

    /// 检查版本是否满足要求
    ///
    /// 除非约束本身指定了预发布版本，否则预发布版本不匹配。
    pub fn contains(
        &self,
        version: &Version,
    ) -> bool {
        if version.is_prerelease() && !self.allows_prereleases() {
            return false;
        }
        self.matches_all(version)
    }

    /// 从候选版本中筛选匹配版本（保持输入顺序）
    ///
    /// 若没有正式版本匹配，则返回匹配的预发布版本。
    pub fn filter<'a, I>(
        &self,
        versions: I,
    ) -> Vec<Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let allow_pre = self.allows_prereleases();
        let mut found = Vec::new();
        let mut found_pre = Vec::new();

        for version in versions {
            if !self.matches_all(version) {
                continue;
            }
            if version.is_prerelease() && !allow_pre {
                found_pre.push(version.clone());
            } else {
                found.push(version.clone());
            }
        }

        if found.is_empty() {
            found_pre
        } else {
            found
        }
    }

    /// 返回满足要求的最高版本
    pub fn select_best<'a, I>(
        &self,
        versions: I,
    ) -> Option<Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        self.filter(versions).into_iter().max()
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let parts: Vec<String> = self.specifiers.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for SpecifierSet {
    type Err = VyperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpecifierSet::parse(s)
    }
}

/// 将 pragma 风格的版本字符串转换为版本约束
///
/// - `0.3.7` → `==0.3.7`
/// - `^0.3.0` → `~=0.3.0`
/// - `>= 0.3.0 < 0.4.0` → `>=0.3.0,<0.4.0`
/// - `=0.3.7` → `==0.3.7`
pub fn pragma_str_to_specifier_set(pragma: &str) -> VyperResult<SpecifierSet> {
    fn to_spec(item: &str) -> String {
        let item = item.replace('^', "~=");
        let mut chars = item.chars();
        match (chars.next(), chars.next()) {
            (Some(c), _) if c.is_ascii_digit() => format!("=={}", item),
            (Some('='), Some(c)) if c != '=' => format!("={}", item),
            _ => item,
        }
    }

    let mut fixed = Vec::new();
    let mut builder = String::new();

    for sub_part in pragma.split_whitespace() {
        let sub_part = sub_part.trim_matches(|c: char| c == ' ' || c == ',');
        let parts: Vec<&str> = sub_part.split(',').map(str::trim).collect();
        if parts.len() > 2 {
            return Err(VyperError::InvalidSpecifier(pragma.to_string()));
        }

        for part in parts {
            if part.is_empty() {
                continue;
            }
            if !part.chars().any(|c| c.is_ascii_digit()) {
                // 运算符与版本号之间有空格，如 `>= 0.3.0`
                builder.push_str(part);
                continue;
            }
            let spec = if builder.is_empty() {
                to_spec(part)
            } else {
                let joined = format!("{}{}", builder, part);
                builder.clear();
                to_spec(&joined)
            };
            fixed.push(spec);
        }
    }

    if !builder.is_empty() {
        return Err(VyperError::InvalidSpecifier(pragma.to_string()));
    }

    SpecifierSet::parse(&fixed.join(","))
}
