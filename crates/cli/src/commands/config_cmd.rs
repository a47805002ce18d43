//! `magnet config`: configuration helpers.

use magnet_config::AppConfig;

pub fn run(path: bool) -> anyhow::Result<()> {
    if path {
        println!("{}", AppConfig::config_dir().join("config.toml").display());
    } else {
        print!("{}", AppConfig::default_toml());
    }
    Ok(())
}
