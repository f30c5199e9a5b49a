use std::path::{Path, PathBuf};
use std::process::Command;

/// Longest a source file may grow, counting non-empty lines.
const MAX_SOURCE_LINES: usize = 750;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/main");
    println!("cargo:rerun-if-changed=.git/packed-refs");
    println!("cargo:rustc-env=CONDUIT_GIT_SHA={}", git_sha());

    let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    check_source_lengths(&PathBuf::from(manifest_dir).join("src"));
}

fn git_sha() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|sha| sha.trim().to_string())
        .filter(|sha| !sha.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Fails the build when a Rust file under `src/` outgrows the limit.
fn check_source_lengths(src: &Path) {
    let mut files = Vec::new();
    collect_rust_files(src, &mut files);

    let mut too_long = Vec::new();
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
        match std::fs::read_to_string(file) {
            Ok(content) => {
                let lines = content.lines().filter(|l| !l.trim().is_empty()).count();
                if lines > MAX_SOURCE_LINES {
                    too_long.push((file, lines));
                }
            }
            Err(e) => println!("cargo:warning=Could not read {}: {}", file.display(), e),
        }
    }

    if !too_long.is_empty() {
        for (file, lines) in &too_long {
            eprintln!(
                "{}: {} non-empty lines (limit {})",
                file.strip_prefix(src).unwrap_or(file).display(),
                lines,
                MAX_SOURCE_LINES
            );
        }
        panic!("{} source file(s) need splitting", too_long.len());
    }
}

fn collect_rust_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }
}
