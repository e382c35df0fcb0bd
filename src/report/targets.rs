//! Supported crash targets.

use crate::report::interpreter::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    Bsd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: OsFamily,
}

const fn linux(arch: &'static str) -> TargetSpec {
    TargetSpec {
        os: "linux",
        arch,
        family: OsFamily::Linux,
    }
}

const fn bsd(os: &'static str) -> TargetSpec {
    TargetSpec {
        os,
        arch: "amd64",
        family: OsFamily::Bsd,
    }
}

const TARGETS: &[TargetSpec] = &[
    linux("amd64"),
    linux("386"),
    linux("arm64"),
    linux("arm"),
    linux("riscv64"),
    linux("s390x"),
    linux("ppc64le"),
    linux("mips64le"),
    bsd("freebsd"),
    bsd("netbsd"),
    bsd("openbsd"),
];

pub fn lookup(platform: &Platform) -> Option<&'static TargetSpec> {
    TARGETS
        .iter()
        .find(|target| target.os == platform.os() && target.arch == platform.arch())
}
