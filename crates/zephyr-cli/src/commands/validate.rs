//! `zephyr validate`: confirm a config path exists and the embedded
//! pipeline definition it stands in for passes structural validation.
//!
//! Parsing an actual config file is out of scope (§6) — there is no
//! parser in this tree to exercise, so this validates the same
//! embedded [`crate::commands::demo::pipeline`] the `run` command
//! drives.

use std::path::Path;

use zephyr_planner::validate_pipeline;

use crate::commands::demo;

pub fn validate(path: &str) {
    if !Path::new(path).exists() {
        eprintln!("config file not found: {path}");
        std::process::exit(1);
    }

    let pipeline = demo::pipeline();
    match validate_pipeline(&pipeline) {
        Ok(()) => {
            println!("pipeline {:?} is valid ({} jobs):", pipeline.name, pipeline.jobs.len());
            for job in &pipeline.jobs {
                let deps = if job.depends_on.is_empty() {
                    String::new()
                } else {
                    format!(" (needs {})", job.depends_on.join(", "))
                };
                println!("  - {}{deps}", job.name);
            }
        }
        Err(err) => {
            eprintln!("invalid pipeline: {err}");
            std::process::exit(1);
        }
    }
}
