//! motion-link: drive a serial motion controller from the command line

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use motion_link_lib::config::{LinkConfig, Verbosity};
use motion_link_lib::device::{MotionController, OperationMode};
use motion_link_lib::serial::interface::available_ports;
use motion_link_lib::serial::{FrameProtocol, LinkVariant};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    /// Per-byte handshake link (RS-232)
    Raw,
    /// DLE/STX framed link with byte stuffing
    Framed,
}

impl From<VariantArg> for LinkVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Raw => LinkVariant::RawHandshake,
            VariantArg::Framed => LinkVariant::FramedStuffed,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "motion-link", version, about = "Send frames to a serial motion controller", long_about = None)]
struct Cli {
    /// JSON link configuration; flags override its values
    #[arg(short, long, env = "MOTION_LINK_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port name (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long, env = "MOTION_LINK_PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Node address of the controller
    #[arg(short, long)]
    node: Option<u8>,

    /// Link encapsulation
    #[arg(long, value_enum)]
    variant: Option<VariantArg>,

    /// Protocol diagnostics (-v summary, -vv byte trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts,
    /// Send a raw frame and print the response
    Send {
        /// Opcode (hex)
        #[arg(value_parser = parse_hex_u8)]
        opcode: u8,
        /// Payload words (hex)
        #[arg(required = true, value_parser = parse_hex_u16)]
        words: Vec<u16>,
        /// Do not wait for a response frame
        #[arg(long)]
        no_response: bool,
    },
    /// Shutdown, then switch on and enable the drive
    Enable,
    /// Disable drive voltage
    Disable,
    /// Clear a latched fault
    FaultReset,
    /// Select the operation mode
    Mode {
        /// profile-position, profile-velocity, homing, position, velocity or current
        mode: OperationMode,
    },
    /// Start homing with the given method
    Home {
        #[arg(allow_hyphen_values = true)]
        method: i8,
    },
    /// Absolute move to a target position
    Position {
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Set the target velocity
    Velocity {
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Set the current setpoint
    Current {
        #[arg(allow_hyphen_values = true)]
        value: i16,
    },
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(strip_hex_prefix(s), 16).map_err(|e| format!("{}: {}", s, e))
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    u16::from_str_radix(strip_hex_prefix(s), 16).map_err(|e| format!("{}: {}", s, e))
}

fn load_config(cli: &Cli) -> anyhow::Result<LinkConfig> {
    let mut config = match &cli.config {
        Some(path) => LinkConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => LinkConfig::default(),
    };

    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(node) = cli.node {
        config.node_id = node;
    }
    if let Some(variant) = cli.variant {
        config.variant = variant.into();
    }
    if cli.verbose > 0 {
        config.verbosity = Verbosity::try_from(cli.verbose.min(2)).map_err(anyhow::Error::msg)?;
    }

    config.validate()?;
    Ok(config)
}

fn list_ports() -> anyhow::Result<()> {
    for port in available_ports()? {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => {
                println!("{}  {:04X}:{:04X}  {}", port.port_name, vid, pid, port.product.unwrap_or_default())
            }
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}

fn motion<F>(config: &LinkConfig, command: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut MotionController) -> motion_link_lib::device::Result<()>,
{
    let mut controller = MotionController::serial(config);
    command(&mut controller)?;
    println!("ok");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("motion_link_lib=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    if matches!(cli.command, Commands::ListPorts) {
        return list_ports();
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::ListPorts => list_ports()?,
        Commands::Send { opcode, words, no_response } => {
            let mut protocol = FrameProtocol::serial(&config);
            if no_response {
                protocol.send(opcode, &words)?;
                println!("sent");
            } else {
                let response = protocol.request(opcode, &words)?;
                let words: Vec<String> = response.words.iter().map(|w| format!("{:04X}", w)).collect();
                println!("{}", words.join(" "));
            }
        }
        Commands::Enable => motion(&config, |c| c.enable())?,
        Commands::Disable => motion(&config, |c| c.disable())?,
        Commands::FaultReset => motion(&config, |c| c.fault_reset())?,
        Commands::Mode { mode } => motion(&config, |c| c.set_operation_mode(mode))?,
        Commands::Home { method } => motion(&config, |c| c.start_homing(method))?,
        Commands::Position { value } => motion(&config, |c| c.move_to_position(value))?,
        Commands::Velocity { value } => motion(&config, |c| c.set_target_velocity(value))?,
        Commands::Current { value } => motion(&config, |c| c.set_current(value))?,
    }

    Ok(())
}
