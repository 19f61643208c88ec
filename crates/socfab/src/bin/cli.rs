use clap::Parser;
use socfab::profile::ports;
use socfab::{
    AxiCompletion, AxiOp, Args, Fabric, FabricBuilder, PortId, Resp, SimulationCore, StopReason,
    load_ports,
};
use tracing::{error, info};

/// Pattern written to and read back from the fabric SRAM
const SMOKE_PATTERN: u128 = 0xC0FF_EE00;

/// Queue a write and a read-back of the SRAM from the HPS-to-FPGA bridge.
/// Returns false when the fabric has no such pair of ports.
fn queue_smoke_traffic(fabric: &mut Fabric) -> bool {
    let Some(window) = fabric.map().window(PortId(ports::SRAM)) else {
        return false;
    };
    let Some(bridge) = fabric.master_bridge(PortId(ports::H2F_AXI)) else {
        return false;
    };
    let spec = *bridge.spec();
    let fabric_addr = window.base;
    let Some(offset) = spec.untranslate(fabric_addr) else {
        return false;
    };
    let axi_addr = bridge.origin().wrapping_add(offset);
    let bus_bytes = spec.source_width / 8;
    info!(
        "Smoke test: {:#X} on h2f maps to fabric {:#X}",
        axi_addr, fabric_addr
    );

    let port = PortId(ports::H2F_AXI);
    fabric
        .push_axi(port, AxiOp::write(1, axi_addr, 2, &[SMOKE_PATTERN], bus_bytes))
        .and_then(|()| fabric.push_axi(port, AxiOp::read(2, axi_addr, 2, 1)))
        .is_ok()
}

fn smoke_passed(fabric: &Fabric) -> bool {
    match fabric.axi_completions(PortId(ports::H2F_AXI)) {
        Some(
            [
                AxiCompletion::Write { resp: w, .. },
                AxiCompletion::Read { data, resp: r, .. },
            ],
        ) => *w == Resp::Okay && *r == Resp::Okay && data[..] == [SMOKE_PATTERN],
        _ => false,
    }
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load port descriptors
    let ports = match args.ports.as_deref().map(load_ports).transpose() {
        Ok(ports) => ports,
        Err(e) => {
            eprintln!("Failed to load ports: {}", e);
            std::process::exit(2);
        }
    };

    let config = match args.to_fabric_config(ports) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Build fabric
    info!("=== Building Fabric ===");
    let mut fabric = match FabricBuilder::new(config).build() {
        Ok(fabric) => fabric,
        Err(e) => {
            eprintln!("Failed to build fabric: {}", e);
            std::process::exit(2);
        }
    };

    // Emit description
    let description = fabric.description();
    match &args.emit {
        Some(path) => {
            if let Err(e) = description.save(path) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => match description.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize fabric description: {}", e);
                std::process::exit(2);
            }
        },
    }

    if !args.simulate {
        std::process::exit(0);
    }

    let smoke = queue_smoke_traffic(&mut fabric);
    if !smoke {
        info!("No h2f bridge and SRAM pair; running without smoke traffic");
    }

    // Run simulation
    info!("=== Running Fabric ===");
    let mut core = SimulationCore::new(fabric, args.to_simulation_config());
    let stop_reason = core.run();

    info!("=== Simulation Complete ===");
    info!("Stop reason: {:?}", stop_reason);
    core.print_final_state();

    let exit_code = match stop_reason {
        StopReason::Timeout => {
            eprintln!("Timeout reached before traffic completed");
            1
        }
        StopReason::CycleLimit => {
            eprintln!("Cycle limit reached before traffic completed");
            1
        }
        StopReason::Idle => {
            let faults = core.fabric().faults();
            if !faults.is_empty() {
                eprintln!("{} protocol fault(s) during the run", faults.len());
                1
            } else if smoke && !smoke_passed(core.fabric()) {
                error!("Smoke test read-back mismatch");
                eprintln!("SRAM read-back did not match the written pattern");
                1
            } else {
                info!("PASS: all traffic completed");
                0
            }
        }
    };

    std::process::exit(exit_code);
}
