use power_meter_simulator::{
    config::Config,
    domain::SimulationType,
    facade::{ControlFacade, MeterData},
    registry::{PortPoolConfig, RegistrySettings},
    SimulatorError, SimulatorRegistry,
};
use std::sync::Arc;
use std::time::Duration;

fn facade(port_count: usize) -> ControlFacade {
    let settings = RegistrySettings {
        random_seed: Some(42),
        ports: PortPoolConfig {
            prefix: "/dev/ttySIM".to_string(),
            count: port_count,
        },
        ..Config::default().registry_settings()
    };
    ControlFacade::new(Arc::new(SimulatorRegistry::new(settings)))
}

fn max_voltage(data: &MeterData) -> f64 {
    data.voltage.max_phase()
}

#[tokio::test(start_paused = true)]
async fn overload_run_ramps_freezes_and_releases_port() {
    let f = facade(4);
    let created = f.create_simulator("ModbusTCP").unwrap();
    let id = created.id.clone();
    f.set_simulation_type(&id, "overload").unwrap();

    let baseline = f.meter_data(&id).unwrap();
    assert_eq!(baseline.simulation_type, SimulationType::Overload);
    let ceiling = 230.0 * 1.10;

    f.set_simulation_state(&id, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut previous = max_voltage(&baseline);
    let mut rose = false;
    for _ in 0..15 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let data = f.meter_data(&id).unwrap();
        let v = max_voltage(&data);
        assert!(data.is_running);
        assert!(v >= max_voltage(&baseline));
        assert!(v <= ceiling + 0.01, "voltage {v} above ceiling");
        assert!(v >= previous);
        rose |= v > max_voltage(&baseline);
        previous = v;
    }
    assert!(rose);

    f.set_simulation_state(&id, false).await.unwrap();
    let frozen = f.meter_data(&id).unwrap();
    assert!(!frozen.is_running);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(f.meter_data(&id).unwrap(), frozen);

    f.remove_simulator(&id).await.unwrap();
    assert!(matches!(f.meter_data(&id), Err(SimulatorError::NotFound(_))));
    assert!(f.registry().is_port_available(&created.port));

    let again = f.create_simulator("ModbusRTU").unwrap();
    assert_eq!(again.port, created.port);
    assert_ne!(again.id, id);
}

#[tokio::test(start_paused = true)]
async fn brownout_run_stays_above_floor() {
    let f = facade(2);
    let id = f.create_simulator("ModbusRTU").unwrap().id;
    f.set_simulation_type(&id, "brownout").unwrap();
    f.set_simulation_state(&id, true).await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;
    let data = f.meter_data(&id).unwrap();
    assert!(data.voltage.min_phase() >= 230.0 * 0.80 - 0.01);
    assert!(data.voltage.max_phase() < 230.0);

    f.shutdown().await;
    assert!(!f.meter_data(&id).unwrap().is_running);
}

#[tokio::test(start_paused = true)]
async fn restart_continues_from_frozen_readings() {
    let f = facade(2);
    let id = f.create_simulator("ModbusTCP").unwrap().id;
    f.set_simulation_type(&id, "overload").unwrap();

    f.set_simulation_state(&id, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    f.set_simulation_state(&id, false).await.unwrap();
    let frozen = f.meter_data(&id).unwrap();

    f.set_simulation_state(&id, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let resumed = f.meter_data(&id).unwrap();

    // one tick of 1 % growth on top of the frozen value
    let expected = frozen.voltage.l1 * 1.01;
    assert!((resumed.voltage.l1 - expected).abs() < 0.02);
}

#[tokio::test]
async fn add_remove_keeps_counts_and_exhaustion_is_reported() {
    let f = facade(2);
    let a = f.create_simulator("ModbusTCP").unwrap();
    let b = f.create_simulator("ModbusTCP").unwrap();
    assert_ne!(a.port, b.port);

    let err = f.create_simulator("ModbusRTU").unwrap_err();
    assert!(matches!(err, SimulatorError::ResourceExhausted(_)));

    f.remove_simulator(&a.id).await.unwrap();
    assert_eq!(f.config().instances.len(), 1);
    assert_eq!(f.registry().available_ports(), 1);
    assert!(matches!(
        f.remove_simulator(&a.id).await,
        Err(SimulatorError::NotFound(_))
    ));
}

#[tokio::test]
async fn reset_stops_running_meters() {
    let f = facade(3);
    let ids: Vec<String> = (0..3)
        .map(|_| f.create_simulator("ModbusRTU").unwrap().id)
        .collect();
    f.set_simulation_state(&ids[1], true).await.unwrap();

    f.reset().await;
    assert!(f.all_meter_data().is_empty());
    assert_eq!(f.registry().available_ports(), 3);
    for id in &ids {
        assert!(matches!(
            f.set_simulation_state(id, true).await,
            Err(SimulatorError::NotFound(_))
        ));
    }
}
