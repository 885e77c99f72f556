//! Resolves the platform and toolchain facts at build time and bakes the
//! rendered detection report into `OUT_DIR/detect-report.txt`.
//!
//! Primary source: preprocess a generated probe file with the C compiler
//! configured for the target and read back the macros it defines. Fallback
//! when no C compiler is usable: map cargo's target strings onto the same
//! symbol set (no PIC/PIE or compiler-version lines on that path).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

#[path = "src/report.rs"]
#[allow(dead_code)]
mod report;

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/report.rs");
    println!("cargo:rerun-if-env-changed=CC");
    println!("cargo:rerun-if-env-changed=CFLAGS");
    println!("cargo:rerun-if-env-changed=TARGET");

    let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR not set")?);

    let defines = match probe_toolchain(&out_dir) {
        Ok(defines) => defines,
        Err(err) => {
            println!("cargo:warning=toolchain probe failed ({err:#}), falling back to target inspection");
            let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
            let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
            report::defines_for_target(&arch, &os)
        }
    };

    let baked = report::Report::from_defines(&defines).render();
    fs::write(out_dir.join("detect-report.txt"), baked).context("write baked report")?;
    Ok(())
}

/// Run the target C compiler's preprocessor over the probe source and parse
/// the echoed macro values.
fn probe_toolchain(out_dir: &Path) -> Result<report::Defines> {
    let probe = out_dir.join("probe.c");
    fs::write(&probe, report::probe_source()).context("write probe source")?;

    let tool = cc::Build::new()
        .cargo_metadata(false)
        .opt_level(0)
        .try_get_compiler()
        .context("locate C compiler for target")?;

    let mut cmd = tool.to_command();
    if tool.is_like_msvc() {
        cmd.arg("/nologo").arg("/EP");
    } else {
        cmd.arg("-E").arg("-P").arg("-x").arg("c");
    }
    let output = cmd
        .arg(&probe)
        .output()
        .with_context(|| format!("run preprocessor {:?}", tool.path()))?;
    if !output.status.success() {
        bail!(
            "preprocessor exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(report::parse_probe_output(&String::from_utf8_lossy(
        &output.stdout,
    )))
}
