//! Environment readiness check.

use crate::config::HarvestConfig;
use crate::session::chromium::find_chromium;
use anyhow::Result;

/// Check Chromium availability and print the resolved configuration.
pub async fn run(config: &HarvestConfig) -> Result<()> {
    println!("OMMS Harvest Doctor");
    println!("===================");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    let chromium_path = find_chromium(config.chromium_path.as_deref());
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Set OMMS_CHROMIUM_PATH or install google-chrome."),
    }

    if config.input_path.exists() {
        println!("[OK] Work list found: {}", config.input_path.display());
    } else {
        println!(
            "[!!] Work list not found: {} (run `omms-harvest taxonomy` first)",
            config.input_path.display()
        );
    }

    let valid = match config.validate() {
        Ok(()) => {
            println!("[OK] Configuration is valid");
            true
        }
        Err(e) => {
            println!("[!!] Configuration is invalid: {e:#}");
            false
        }
    };

    println!();
    println!("Portal:   {}", config.portal_url);
    println!("Year:     {}", config.year_label);
    println!("Scheme:   {}", config.scheme_label);
    println!("Workers:  {}", config.worker_count);
    println!("Headless: {}", config.headless);

    println!();
    if chromium_path.is_some() && valid {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
