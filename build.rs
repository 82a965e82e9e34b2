//! Links `libespeak-ng` when the `espeak` feature is enabled.
//!
//! Resolution order: the `ESPEAK_LIB_DIR` env var, then pkg-config (with
//! Homebrew's pkgconfig directories added on macOS), then a walk over the
//! usual per-platform library directories.  A static archive is preferred
//! over the shared library; static espeak-ng also needs the C++ standard
//! library because the project is C++ internally.

use std::path::{Path, PathBuf};
use std::process::Command;

enum Linkage {
    Static,
    Dynamic,
}

fn main() {
    println!("cargo:rerun-if-env-changed=ESPEAK_LIB_DIR");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");

    // Default builds have no native dependency at all.
    if std::env::var("CARGO_FEATURE_ESPEAK").is_err() {
        return;
    }

    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if let Ok(dir) = std::env::var("ESPEAK_LIB_DIR") {
        emit_link(&dir, probe_dir(&dir, &os).unwrap_or(Linkage::Dynamic), &os);
        return;
    }

    if pkg_config_link(&os) {
        return;
    }

    for dir in search_dirs(&os, &arch) {
        if let Some(linkage) = probe_dir(&dir, &os) {
            emit_link(&dir, linkage, &os);
            return;
        }
    }

    panic!(
        "\n\n\
         kokorotts: libespeak-ng not found.\n\
         \n\
         Install it:\n\
         \t  macOS   :  brew install espeak-ng\n\
         \t  Ubuntu  :  sudo apt install libespeak-ng-dev\n\
         \t  Fedora  :  sudo dnf install espeak-ng-devel\n\
         \t  Alpine  :  apk add espeak-ng-dev\n\
         \t  Arch    :  sudo pacman -S espeak-ng\n\
         \n\
         Or point at it explicitly:\n\
         \t  ESPEAK_LIB_DIR=/your/path/lib cargo build --features espeak\n\n"
    );
}

/// Which espeak-ng library variant, if any, lives in `dir`.
fn probe_dir(dir: &str, os: &str) -> Option<Linkage> {
    if Path::new(dir).join("libespeak-ng.a").exists() {
        return Some(Linkage::Static);
    }
    let shared = if os == "macos" { "libespeak-ng.dylib" } else { "libespeak-ng.so" };
    if Path::new(dir).join(shared).exists() {
        return Some(Linkage::Dynamic);
    }
    None
}

fn emit_link(dir: &str, linkage: Linkage, os: &str) {
    println!("cargo:rustc-link-search=native={dir}");
    match linkage {
        Linkage::Static => {
            println!("cargo:rustc-link-lib=static=espeak-ng");
            let cxx = if os == "macos" { "c++" } else { "stdc++" };
            println!("cargo:rustc-link-lib=dylib={cxx}");
        }
        Linkage::Dynamic => println!("cargo:rustc-link-lib=dylib=espeak-ng"),
    }
}

/// Resolve through pkg-config, returning true when directives were emitted.
///
/// `PKG_CONFIG_PATH` is passed per-invocation rather than set globally; on
/// macOS it is extended with the Homebrew prefixes so a keg-only install
/// still resolves.
fn pkg_config_link(os: &str) -> bool {
    let mut paths: Vec<String> = Vec::new();

    if os == "macos" {
        if let Some(keg) = command_stdout("brew", &["--prefix", "espeak-ng"]) {
            push_if_dir(&mut paths, format!("{keg}/lib/pkgconfig"));
        }
        for prefix in ["/opt/homebrew", "/usr/local"] {
            push_if_dir(&mut paths, format!("{prefix}/lib/pkgconfig"));
            push_if_dir(&mut paths, format!("{prefix}/share/pkgconfig"));
        }
    }
    if let Ok(existing) = std::env::var("PKG_CONFIG_PATH") {
        if !existing.is_empty() {
            paths.push(existing);
        }
    }
    let pkg_path = paths.join(":");

    let flags = match run_pkg_config(&["--libs", "--static", "espeak-ng"], &pkg_path)
        .or_else(|| run_pkg_config(&["--libs", "espeak-ng"], &pkg_path))
    {
        Some(f) => f,
        None => return false,
    };

    for token in flags.split_whitespace() {
        if let Some(path) = token.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={path}");
        } else if let Some(lib) = token.strip_prefix("-l") {
            println!("cargo:rustc-link-lib=dylib={lib}");
        }
    }

    // Homebrew's lib dir is not on the default linker search path, so the
    // reported libdir is emitted explicitly as well.
    if let Some(libdir) = run_pkg_config(&["--variable=libdir", "espeak-ng"], &pkg_path) {
        let libdir = libdir.trim();
        if !libdir.is_empty() {
            println!("cargo:rustc-link-search=native={libdir}");
        }
    }
    true
}

fn run_pkg_config(args: &[&str], pkg_path: &str) -> Option<String> {
    let out = Command::new("pkg-config")
        .args(args)
        .env("PKG_CONFIG_PATH", pkg_path)
        .output()
        .ok()?;
    if out.status.success() {
        String::from_utf8(out.stdout).ok()
    } else {
        None
    }
}

fn command_stdout(cmd: &str, args: &[&str]) -> Option<String> {
    let out = Command::new(cmd).args(args).output().ok()?;
    if out.status.success() {
        Some(String::from_utf8(out.stdout).ok()?.trim().to_owned())
    } else {
        None
    }
}

fn push_if_dir(paths: &mut Vec<String>, candidate: String) {
    if Path::new(&candidate).is_dir() {
        paths.push(candidate);
    }
}

/// Library directories to probe, most specific first.
fn search_dirs(os: &str, arch: &str) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();

    if os == "macos" {
        if let Some(keg) = command_stdout("brew", &["--prefix", "espeak-ng"]) {
            dirs.push(format!("{keg}/lib"));
        }
        for prefix in ["/opt/homebrew", "/usr/local"] {
            dirs.push(format!("{prefix}/opt/espeak-ng/lib"));
            dirs.push(format!("{prefix}/lib"));
        }
    } else {
        let multiarch = match arch {
            "x86_64" => Some("x86_64-linux-gnu"),
            "aarch64" => Some("aarch64-linux-gnu"),
            "arm" => Some("arm-linux-gnueabihf"),
            "riscv64" => Some("riscv64-linux-gnu"),
            "s390x" => Some("s390x-linux-gnu"),
            "powerpc64le" => Some("powerpc64le-linux-gnu"),
            _ => None,
        };
        if let Some(m) = multiarch {
            dirs.push(format!("/usr/lib/{m}"));
        }
        dirs.extend(["/usr/lib64", "/usr/lib", "/usr/local/lib"].map(String::from));
    }

    dirs.into_iter()
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}
