//! Build script for `bpg`.
//!
//! Embeds the build timestamp, commit, target triple and rustc version so
//! `bpg --version` identifies exactly which rule sets a binary carries.

use vergen_gix::{BuildBuilder, CargoBuilder, Emitter, GixBuilder, RustcBuilder};

fn main() {
    let mut emitter = Emitter::default();

    match BuildBuilder::default().build_timestamp(true).build() {
        Ok(build) => warn_on_err("build", emitter.add_instructions(&build).map(|_| ())),
        Err(e) => println!("cargo:warning=vergen build config failed: {e}"),
    }

    match CargoBuilder::default().target_triple(true).build() {
        Ok(cargo) => warn_on_err("cargo", emitter.add_instructions(&cargo).map(|_| ())),
        Err(e) => println!("cargo:warning=vergen cargo config failed: {e}"),
    }

    match RustcBuilder::default().semver(true).build() {
        Ok(rustc) => warn_on_err("rustc", emitter.add_instructions(&rustc).map(|_| ())),
        Err(e) => println!("cargo:warning=vergen rustc config failed: {e}"),
    }

    // Source tarballs have no repository; the sha is simply absent then.
    match GixBuilder::default().sha(true).build() {
        Ok(gix) => warn_on_err("git", emitter.add_instructions(&gix).map(|_| ())),
        Err(e) => println!("cargo:warning=vergen git config failed: {e}"),
    }

    warn_on_err("emit", emitter.emit());
}

fn warn_on_err<E: std::fmt::Display>(stage: &str, result: Result<(), E>) {
    if let Err(e) = result {
        println!("cargo:warning=vergen {stage} instructions failed: {e}");
    }
}
