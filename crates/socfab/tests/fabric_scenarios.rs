use socfab::bus::{AddrBeat, WriteBeat};
use socfab::csr::CsrRegister;
use socfab::fabric::BankDeclaration;
use socfab::{
    AxiCompletion, AxiOp, BankContents, Fabric, FabricBuilder, FabricConfig, FaultKind,
    PlatformProfile, PortDescriptor, PortId, Protocol, Resp, SimpleRequest, SimulationConfig,
    SimulationCore, StopReason, TieBreak,
};

fn build(config: FabricConfig) -> Fabric {
    FabricBuilder::new(config).build().unwrap()
}

fn run(fabric: Fabric) -> Fabric {
    let mut core = SimulationCore::new(
        fabric,
        SimulationConfig {
            max_cycles: Some(100_000),
            ..SimulationConfig::default()
        },
    );
    assert_eq!(core.run(), StopReason::Idle);
    core.into_fabric()
}

fn sram(id: u32, base: u64, size: u64) -> PortDescriptor {
    PortDescriptor::slave(id, "sram", Protocol::SimpleSync, 32, 30, base, size)
}

#[test]
fn wide_write_lands_on_translated_words() {
    let mut fabric = build(FabricConfig {
        ports: vec![
            PortDescriptor::master(0, "h2f", Protocol::WideSplit, 64, 30),
            PortDescriptor::master(1, "reader", Protocol::SimpleSync, 32, 30),
            sram(2, 0x0, 0x1000),
        ],
        ..FabricConfig::default()
    });
    fabric
        .push_axi(PortId(0), AxiOp::write(0, 0x100, 2, &[0xD0D0_0000, 0xD1D1_1111], 8))
        .unwrap();
    let mut fabric = run(fabric);

    assert!(matches!(
        fabric.axi_completions(PortId(0)),
        Some([AxiCompletion::Write {
            id: 0,
            resp: Resp::Okay,
            ..
        }])
    ));
    assert_eq!(fabric.device(PortId(2)).map(|d| d.accesses()), Some(2));

    fabric
        .push_simple(PortId(1), SimpleRequest::read(0x200, 0xF))
        .unwrap();
    fabric
        .push_simple(PortId(1), SimpleRequest::read(0x204, 0xF))
        .unwrap();
    let fabric = run(fabric);
    let words: Vec<u128> = fabric
        .simple_completions(PortId(1))
        .unwrap()
        .iter()
        .map(|c| c.resp.dat_r)
        .collect();
    assert_eq!(words, vec![0xD0D0_0000, 0xD1D1_1111]);
}

#[test]
fn two_masters_alternate_on_a_shared_slave() {
    let mut fabric = build(FabricConfig {
        ports: vec![
            PortDescriptor::master(0, "a", Protocol::SimpleSync, 32, 30),
            PortDescriptor::master(1, "b", Protocol::SimpleSync, 32, 30),
            sram(2, 0x0, 0x1000),
        ],
        record_grants: true,
        ..FabricConfig::default()
    });
    for i in 0..600u64 {
        fabric
            .push_simple(PortId(0), SimpleRequest::write(i % 64 * 4, 0xA, 0xF))
            .unwrap();
        fabric
            .push_simple(PortId(1), SimpleRequest::write(i % 64 * 4, 0xB, 0xF))
            .unwrap();
    }
    let fabric = run(fabric);

    assert!(fabric.cycle() >= 1000);
    let grants = fabric.grants();
    assert_eq!(grants.len(), 1200);
    assert_eq!(grants[0].master, PortId(0));
    assert!(grants.windows(2).all(|g| g[0].master != g[1].master));
    for port in [PortId(0), PortId(1)] {
        let done = fabric.simple_completions(port).unwrap();
        assert_eq!(done.len(), 600);
        assert!(done.iter().all(|c| !c.resp.err));
    }
}

#[test]
fn descending_tie_break_grants_highest_id_first() {
    let mut fabric = build(FabricConfig {
        ports: vec![
            PortDescriptor::master(0, "a", Protocol::SimpleSync, 32, 30),
            PortDescriptor::master(1, "b", Protocol::SimpleSync, 32, 30),
            sram(2, 0x0, 0x1000),
        ],
        tie_break: TieBreak::Descending,
        record_grants: true,
        ..FabricConfig::default()
    });
    for port in [PortId(0), PortId(1)] {
        fabric
            .push_simple(port, SimpleRequest::read(0x0, 0xF))
            .unwrap();
    }
    let fabric = run(fabric);
    let order: Vec<PortId> = fabric.grants().iter().map(|g| g.master).collect();
    assert_eq!(order, vec![PortId(1), PortId(0)]);
}

#[test]
fn faulting_bridge_does_not_stop_its_neighbour() {
    let mut fabric = build(FabricConfig {
        ports: vec![
            PortDescriptor::master(0, "bad", Protocol::WideSplit, 32, 30),
            PortDescriptor::master(1, "good", Protocol::WideSplit, 32, 30),
            sram(2, 0x0, 0x1000),
        ],
        ..FabricConfig::default()
    });

    // Four-beat burst whose first beat already claims to be the last
    let early_last = AxiOp::Write {
        aw: AddrBeat::incr(3, 0x40, 2, 4),
        beats: (0..4)
            .map(|i| WriteBeat {
                data: i,
                strb: 0xF,
                last: true,
            })
            .collect(),
    };
    fabric.push_axi(PortId(0), early_last).unwrap();
    for i in 0..8u64 {
        fabric
            .push_axi(PortId(1), AxiOp::write(1, 0x100 + i * 4, 2, &[u128::from(i)], 4))
            .unwrap();
        fabric
            .push_axi(PortId(1), AxiOp::read(2, 0x100 + i * 4, 2, 1))
            .unwrap();
    }
    let fabric = run(fabric);

    assert_eq!(fabric.faults().len(), 1);
    let fault = &fabric.faults()[0];
    assert_eq!(fault.port, PortId(0));
    assert!(matches!(fault.kind, FaultKind::EarlyLast { beat: 0, beats: 4 }));
    assert!(fabric.master_bridge(PortId(0)).unwrap().is_halted());
    assert!(!fabric.master_bridge(PortId(1)).unwrap().is_halted());

    let good = fabric.axi_completions(PortId(1)).unwrap();
    assert_eq!(good.len(), 16);
    assert!(good.iter().all(|c| c.resp() == Resp::Okay));
    let reads: Vec<u128> = good
        .iter()
        .filter_map(|c| match c {
            AxiCompletion::Read { data, .. } => Some(data[0]),
            AxiCompletion::Write { .. } => None,
        })
        .collect();
    assert_eq!(reads, (0..8).collect::<Vec<u128>>());
}

#[test]
fn undecoded_addresses_get_an_error() {
    let mut fabric = build(FabricConfig {
        ports: vec![
            PortDescriptor::master(0, "cpu", Protocol::SimpleSync, 32, 30),
            PortDescriptor::master(1, "h2f", Protocol::WideSplit, 64, 30),
            sram(2, 0x0, 0x1000),
        ],
        ..FabricConfig::default()
    });
    fabric
        .push_simple(PortId(0), SimpleRequest::read(0x9000_0000, 0xF))
        .unwrap();
    fabric
        .push_axi(PortId(1), AxiOp::write(0, 0x1000, 3, &[0x55], 8))
        .unwrap();
    let fabric = run(fabric);

    let simple = fabric.simple_completions(PortId(0)).unwrap();
    assert!(simple[0].resp.err);
    let axi = fabric.axi_completions(PortId(1)).unwrap();
    assert_eq!(axi[0].resp(), Resp::SlvErr);
    // The 64-bit write spans two 32-bit words
    assert_eq!(fabric.interconnect().decode_errors(), 3);
    assert!(fabric.faults().is_empty());
}

#[test]
fn slow_slave_backpressures_bursts() {
    let latency = 5;
    let mut fabric = build(FabricConfig {
        ports: vec![
            PortDescriptor::master(0, "h2f", Protocol::WideSplit, 64, 30),
            sram(1, 0x0, 0x1000),
        ],
        device_latency: latency,
        ..FabricConfig::default()
    });
    let data = [
        0x0011_2233_4455_6677,
        0x8899_AABB_CCDD_EEFF,
        0x0123_4567_89AB_CDEF,
        0xFEDC_BA98_7654_3210,
    ];
    fabric
        .push_axi(PortId(0), AxiOp::write(1, 0x80, 3, &data, 8))
        .unwrap();
    fabric
        .push_axi(PortId(0), AxiOp::read(2, 0x80, 3, 4))
        .unwrap();
    let fabric = run(fabric);

    let done = fabric.axi_completions(PortId(0)).unwrap();
    let AxiCompletion::Write { resp, cycle, .. } = &done[0] else {
        panic!("write first");
    };
    assert_eq!(*resp, Resp::Okay);
    // Eight simple words, each held for the device latency
    assert!(*cycle >= 8 * u64::from(latency));
    let AxiCompletion::Read { data: got, resp, .. } = &done[1] else {
        panic!("read second");
    };
    assert_eq!(*resp, Resp::Okay);
    assert_eq!(got, &data.to_vec());
    assert_eq!(fabric.device(PortId(1)).map(|d| d.accesses()), Some(16));
}

#[test]
fn simple_master_reaches_hps_memory_through_bridge() {
    let profile = PlatformProfile::cyclone_v("linuxsd").unwrap();
    let mut config = FabricConfig::from_profile(profile);
    config
        .ports
        .push(PortDescriptor::master(9, "dma", Protocol::SimpleSync, 32, 30));
    let mut fabric = build(config);

    let addrs = [0x4000_0000u64, 0x4000_0004, 0x4000_0010, 0x6000_0100];
    for (i, &addr) in addrs.iter().enumerate() {
        fabric
            .push_simple(PortId(9), SimpleRequest::write(addr, 0x100 + i as u128, 0xF))
            .unwrap();
    }
    for &addr in &addrs {
        fabric
            .push_simple(PortId(9), SimpleRequest::read(addr, 0xF))
            .unwrap();
    }
    let fabric = run(fabric);

    let done = fabric.simple_completions(PortId(9)).unwrap();
    let reads: Vec<u128> = done.iter().filter(|c| !c.req.we).map(|c| c.resp.dat_r).collect();
    assert_eq!(reads, vec![0x100, 0x101, 0x102, 0x103]);
    assert!(done.iter().all(|c| !c.resp.err));
    // 32-bit fabric words pack into the lanes of the 128-bit port
    let ram = fabric.axi_ram(PortId(2)).unwrap();
    assert_eq!(ram.memory().read_word(0x0, 8), 0x0000_0101_0000_0100);
    assert_eq!(ram.memory().read_word(0x10, 4), 0x102);
    assert!(fabric.faults().is_empty());
}

#[test]
fn csr_registers_through_the_fabric() {
    let mut fabric = build(FabricConfig {
        ports: vec![
            PortDescriptor::master(0, "cpu", Protocol::SimpleSync, 32, 30),
            PortDescriptor {
                base_address: None,
                size: None,
                ..PortDescriptor::slave(1, "csr", Protocol::RegisterBus, 32, 14, 0, 0)
            },
        ],
        banks: vec![
            BankDeclaration::new(
                "uart",
                BankContents::Registers(vec![
                    CsrRegister::rw("ctrl", 32),
                    CsrRegister::ro("id", 32).with_reset(0x1234),
                ]),
            ),
            BankDeclaration::new("scratch", BankContents::Memory { words: 8 }).at(4),
        ],
        ..FabricConfig::default()
    });
    let uart = fabric.layout().bank("uart").unwrap().clone();
    let ctrl = uart.register("ctrl").unwrap().address;
    let id = uart.register("id").unwrap().address;
    assert_eq!((ctrl, id), (0xE000_0000, 0xE000_0004));
    let scratch = fabric.layout().bank("scratch").unwrap().base;
    assert_eq!(scratch, 0xE000_2000);

    let requests = [
        SimpleRequest::write(ctrl, 0xAB, 0xF),
        SimpleRequest::read(ctrl, 0xF),
        SimpleRequest::read(id, 0xF),
        SimpleRequest::write(id, 0, 0xF),
        SimpleRequest::write(scratch + 0x1C, 0x77, 0xF),
        SimpleRequest::read(scratch + 0x1C, 0xF),
    ];
    for req in requests {
        fabric.push_simple(PortId(0), req).unwrap();
    }
    let fabric = run(fabric);

    let resp: Vec<(bool, u128)> = fabric
        .simple_completions(PortId(0))
        .unwrap()
        .iter()
        .map(|c| (c.resp.err, c.resp.dat_r))
        .collect();
    assert_eq!(
        resp,
        vec![
            (false, 0),
            (false, 0xAB),
            (false, 0x1234),
            (true, 0),
            (false, 0),
            (false, 0x77),
        ]
    );
}

#[test]
fn description_json_lists_windows_and_banks() {
    let profile = PlatformProfile::cyclone_v("standard").unwrap();
    let fabric = build(FabricConfig {
        banks: vec![
            BankDeclaration::new("uart", BankContents::Memory { words: 8 }),
            BankDeclaration::new("timer", BankContents::Memory { words: 4 }),
        ],
        ..FabricConfig::from_profile(profile)
    });

    let json = fabric.description().to_json().unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["profile"], "cyclone_v/standard");
    assert_eq!(v["fabric_width"], 32);

    let names: Vec<&str> = v["windows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["sram", "f2h_axi", "f2h_sdram", "uart", "timer"]);

    let banks = v["csr"]["banks"].as_array().unwrap();
    assert_eq!(banks[0]["base"], 0xE000_0000u64);
    assert_eq!(banks[1]["base"], 0xE000_0800u64);
    assert_eq!(banks[1]["size"], 0x800);
    assert_eq!(banks[1]["kind"], "memory");
    assert_eq!(v["csr"]["granularity"], 0x800);
}
