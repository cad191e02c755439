//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sidewalk_core::{LinkMask, LinkType};

#[derive(Parser)]
#[command(author, version, about = "Simulated Sidewalk end device", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the simulated device through a full lifecycle
    Run {
        /// Number of messages to send
        #[arg(short, long, default_value_t = 3)]
        messages: usize,

        /// Number of link switches to perform
        #[arg(short, long, default_value_t = 1)]
        switches: usize,

        /// Override the initial link mask (e.g. "ble", "fsk", "ble|lora", "0x5")
        #[arg(long, value_parser = parse_link_mask)]
        link: Option<LinkMask>,
    },
    /// Print the link mask that follows MASK in the link-switch cycle
    NextLink {
        #[arg(value_parser = parse_link_mask)]
        mask: LinkMask,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}

/// Parse a link mask from raw bits or link names
///
/// Accepts decimal (`5`), hexadecimal (`0x5`) or names joined with `|`, `,`
/// or `+` (`ble|lora`). `none` is the empty mask.
pub fn parse_link_mask(input: &str) -> Result<LinkMask, String> {
    let input = input.trim();
    if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex, 16)
            .map(LinkMask::from_bits)
            .map_err(|e| format!("invalid hex mask '{}': {}", input, e));
    }
    if let Ok(bits) = input.parse::<u32>() {
        return Ok(LinkMask::from_bits(bits));
    }

    let mut mask = LinkMask::NONE;
    for name in input.split(['|', ',', '+']) {
        match name.trim().to_ascii_lowercase().as_str() {
            "ble" => mask |= LinkMask::from(LinkType::Ble),
            "fsk" => mask |= LinkMask::from(LinkType::Fsk),
            "lora" => mask |= LinkMask::from(LinkType::Lora),
            "none" => {}
            other => return Err(format!("unknown link '{}'", other)),
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_parse_from_numbers_and_names() {
        assert_eq!(parse_link_mask("1"), Ok(LinkMask::BLE));
        assert_eq!(parse_link_mask("0x2"), Ok(LinkMask::FSK));
        assert_eq!(parse_link_mask("ble|lora"), Ok(LinkMask::BLE | LinkMask::LORA));
        assert_eq!(parse_link_mask("LoRa, BLE"), Ok(LinkMask::BLE | LinkMask::LORA));
        assert_eq!(parse_link_mask("none"), Ok(LinkMask::NONE));
        assert!(parse_link_mask("wifi").is_err());
        assert!(parse_link_mask("0xZZ").is_err());
    }

    #[test]
    fn cli_parses_run_options() {
        let cli = Cli::parse_from(["sid-end-device", "-v", "run", "-m", "5", "--link", "fsk"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                messages,
                switches,
                link,
            } => {
                assert_eq!(messages, 5);
                assert_eq!(switches, 1);
                assert_eq!(link, Some(LinkMask::FSK));
            }
            _ => panic!("expected run"),
        }
    }
}
