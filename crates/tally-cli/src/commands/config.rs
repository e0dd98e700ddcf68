use tally_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            remote_url,
            user_id,
            device_id,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(global_profile);
            apply_config_init(
                &mut config,
                &profile_name,
                remote_url,
                user_id,
                device_id,
                !no_activate,
            )?;
            let path = config.save().map_err(CliError::Config)?;
            println!("Saved profile '{profile_name}' to {}", path.display());
            Ok(())
        }
    }
}

/// Merge explicit settings into `profile_name`; unset flags keep existing values
pub fn apply_config_init(
    config: &mut CliProfilesConfig,
    profile_name: &str,
    remote_url: Option<String>,
    user_id: Option<String>,
    device_id: Option<String>,
    activate: bool,
) -> Result<(), CliError> {
    let remote_url = normalize_text_option(remote_url);
    if let Some(url) = remote_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "remote URL must include http:// or https://".to_string(),
            ));
        }
    }

    let profile = config.profile_mut_or_default(profile_name);
    if remote_url.is_some() {
        profile.remote_url = remote_url;
    }
    if let Some(user_id) = normalize_text_option(user_id) {
        profile.user_id = Some(user_id);
    }
    if let Some(device_id) = normalize_text_option(device_id) {
        profile.device_id = Some(device_id);
    }

    if activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.to_string());
    }
    Ok(())
}
