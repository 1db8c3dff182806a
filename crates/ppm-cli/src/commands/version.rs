use miette::Result;
use ppm_core::version::{version_string, VERSION};
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
}

pub fn run(json: bool) -> Result<()> {
    if json {
        return super::print_json(&VersionOutput {
            name: "ppm",
            version: VERSION,
        });
    }
    println!("{}", version_string());
    Ok(())
}
