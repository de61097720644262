use soulon_key_core::infrastructure::platform::PlatformFeatures;
use soulon_key_core::shared::constants::DERIVATION_PATH;
use soulon_key_core::shared::settings::KeyCoreConfig;

fn main() {
    let config = match KeyCoreConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let platform = PlatformFeatures::detect();

    println!("Soulon Key Core Configuration:\n");
    println!("  Log level: {}", config.log_level);
    println!("  Key store backend: {}", config.keystore_backend);
    println!("  Storage directory: {}", config.resolved_storage_dir().display());
    println!("  Prompt: {} / {}", config.prompt_title, config.prompt_subtitle);
    println!("  Max credential attempts: {}", config.max_credential_attempts);
    println!("  Require user authentication: {}", config.require_user_authentication);
    println!(
        "  Derivation path: m/{}",
        DERIVATION_PATH
            .iter()
            .map(|index| format!("{}'", index))
            .collect::<Vec<_>>()
            .join("/")
    );
    println!();
    println!("Platform:\n");
    println!("  Name: {} ({})", platform.platform_name, platform.architecture);
    println!("  OS version: {}", platform.os_version);
    println!("  Hardware key store: {}", platform.has_hardware_keystore);
    println!("  Biometric authentication: {}", platform.has_biometric_auth);
    println!("  Recommended security level: {:?}", platform.recommended_security_level());
}
