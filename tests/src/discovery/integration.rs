#![cfg(test)]
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scaleout_common::config::{Config, Mode};
use scaleout_common::network::AdminState;
use scaleout_common::stop::StopSignal;
use scaleout_core::gaudinet::GaudiNet;
use scaleout_core::host::fake::{FakeHost, FakeOp};
use scaleout_core::nm::{UNMANAGED_CONF, write_keyfile};
use scaleout_core::orchestrator::{Orchestrator, interface_names};
use tempfile::TempDir;

use super::util::{ScriptedNeighbors, three_devices, three_links, v4};

fn l3_config(root: &Path) -> Config {
    Config {
        configure: true,
        mode: Mode::L3,
        wait: Duration::from_secs(5),
        sysfs_root: root.to_path_buf(),
        gaudinet: Some(root.join("habanalabs").join("gaudinet.json")),
        nm_conf_dir: root.join("NetworkManager").join("conf.d"),
        ..Config::default()
    }
}

fn read_address_map(path: &Path) -> GaudiNet {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Full L3 run against a fabricated sysfs tree: stale addresses are gone,
/// derived ones and their routes are in place, and the address map lists
/// every addressed link.
#[tokio::test]
async fn l3_configures_links_from_lldp() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let mut cfg = l3_config(root.path());
    cfg.mtu = 8000;

    let host = Arc::new(three_links());
    let neighbors = Arc::new(ScriptedNeighbors::standard());
    let orchestrator = Orchestrator::new(host.clone(), neighbors.clone());

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();

    assert_eq!(report.configured, 2);
    assert_eq!(report.store.len(), 3);
    assert_eq!(host.addrs("eth_a"), vec![v4(10, 210, 8, 121, 30)]);
    assert!(host.addrs("eth_b").is_empty());
    assert_eq!(host.addrs("eth_c"), vec![v4(10, 210, 8, 125, 30)]);

    let destinations: Vec<_> = host.routes().iter().map(|r| r.destination).collect();
    assert_eq!(destinations, vec![v4(10, 210, 8, 120, 30), v4(10, 210, 8, 124, 30)]);

    for name in ["eth_a", "eth_b", "eth_c"] {
        assert_eq!(host.mtu(name), Some(8000), "{name}");
        assert_eq!(host.admin_state(name), Some(AdminState::Up), "{name}");
    }

    let map: GaudiNet = read_address_map(cfg.gaudinet.as_ref().unwrap());
    let ips: Vec<Ipv4Addr> = map.nic_net_config.iter().map(|e| e.nic_ip).collect();
    assert_eq!(ips, vec![Ipv4Addr::new(10, 210, 8, 121), Ipv4Addr::new(10, 210, 8, 125)]);
    assert!(map.nic_net_config.iter().all(|e| e.gateway_mac == "01:01:02:02:03:03"));
    assert_eq!(report.address_map, cfg.gaudinet);
}

#[tokio::test]
async fn l3_discovery_only_leaves_addresses_alone() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let mut cfg = l3_config(root.path());
    cfg.configure = false;

    let host = Arc::new(three_links());
    let orchestrator = Orchestrator::new(host.clone(), Arc::new(ScriptedNeighbors::standard()));

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();

    assert_eq!(report.configured, 0);
    assert_eq!(
        report.store.get("eth_c").unwrap().local_addr,
        Some(Ipv4Addr::new(10, 210, 8, 125))
    );
    assert!(host.added().is_empty());
    assert!(host.deleted().is_empty());
    assert!(host.routes().is_empty());
    assert_eq!(host.admin_state("eth_a"), Some(AdminState::Down));
    assert!(!cfg.gaudinet.unwrap().exists());
}

#[tokio::test]
async fn l2_only_raises_links() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let cfg = Config {
        mode: Mode::L2,
        ..l3_config(root.path())
    };

    let host = Arc::new(three_links());
    let neighbors = Arc::new(ScriptedNeighbors::standard());
    let orchestrator = Orchestrator::new(host.clone(), neighbors.clone());

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();

    assert_eq!(report.mode, Mode::L2);
    assert_eq!(neighbors.calls(), 0);
    assert!(host.added().is_empty());
    assert_eq!(host.addrs("eth_a"), vec![v4(192, 192, 192, 1, 24)]);
    assert_eq!(host.calls(FakeOp::SetUp).len(), 3);
    assert!(!cfg.gaudinet.unwrap().exists());
}

#[tokio::test(start_paused = true)]
async fn keep_running_listens_until_every_link_answered() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let mut cfg = l3_config(root.path());
    cfg.keep_running = true;

    let neighbors = Arc::new(ScriptedNeighbors::new(vec![
        vec![("eth_a", "no-alert 10.210.8.122/30")],
        vec![("eth_b", "unexpected port description")],
        vec![("eth_c", "no-alert 10.210.8.126/30")],
    ]));
    let host = Arc::new(three_links());
    let orchestrator = Orchestrator::new(host.clone(), neighbors.clone());

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();

    assert_eq!(neighbors.calls(), 3);
    let asked = neighbors.asked();
    assert_eq!(asked[1], vec!["eth_b".to_string(), "eth_c".to_string()]);
    assert_eq!(asked[2], vec!["eth_c".to_string()]);
    assert_eq!(report.configured, 2);
}

#[tokio::test]
async fn keep_running_stops_on_signal() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let mut cfg = l3_config(root.path());
    cfg.keep_running = true;
    cfg.configure = false;

    let neighbors = Arc::new(ScriptedNeighbors::new(vec![vec![]]));
    let orchestrator = Orchestrator::new(Arc::new(three_links()), neighbors.clone());
    let (handle, stop) = StopSignal::new();
    handle.stop();

    orchestrator.run(&cfg, &stop).await.unwrap();
    assert_eq!(neighbors.calls(), 1);
}

#[tokio::test]
async fn missing_driver_means_nothing_to_do() {
    let root = TempDir::new().unwrap();
    let host = Arc::new(FakeHost::new());
    let orchestrator = Orchestrator::new(host.clone(), Arc::new(ScriptedNeighbors::standard()));

    let report = orchestrator.run(&l3_config(root.path()), &StopSignal::never()).await.unwrap();

    assert!(report.store.is_empty());
    assert!(host.calls(FakeOp::LinkByName).is_empty());
}

#[tokio::test]
async fn route_failures_do_not_abort_the_run() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let cfg = l3_config(root.path());

    let host = Arc::new(three_links());
    host.fail(FakeOp::RouteAppend);
    let orchestrator = Orchestrator::new(host.clone(), Arc::new(ScriptedNeighbors::standard()));

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();

    assert_eq!(report.configured, 2);
    assert!(host.routes().is_empty());
    assert!(cfg.gaudinet.unwrap().exists());
}

#[tokio::test]
async fn address_removal_failure_aborts_before_adding() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let cfg = l3_config(root.path());

    let host = Arc::new(three_links());
    host.fail(FakeOp::AddrDel);
    let orchestrator = Orchestrator::new(host.clone(), Arc::new(ScriptedNeighbors::standard()));

    let err = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap_err();

    assert!(format!("{err:#}").contains("removing existing addresses"));
    assert!(host.calls(FakeOp::AddrAdd).is_empty());
    assert!(!cfg.gaudinet.unwrap().exists());
}

#[test]
fn network_manager_keyfile_covers_enumerated_links() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let cfg = l3_config(root.path());

    let names = interface_names(&cfg);
    let path = write_keyfile(&cfg.nm_conf_dir, &names).unwrap();

    assert_eq!(path, cfg.nm_conf_dir.join(UNMANAGED_CONF));
    let keyfile = std::fs::read_to_string(path).unwrap();
    assert!(keyfile.contains("interface-name:eth_a;interface-name:eth_b;interface-name:eth_c"));
}

#[tokio::test]
async fn interface_override_skips_sysfs() {
    let root = TempDir::new().unwrap();
    let mut cfg = l3_config(root.path());
    cfg.interfaces = vec!["eth_c".into()];

    let host = Arc::new(three_links());
    let orchestrator = Orchestrator::new(host.clone(), Arc::new(ScriptedNeighbors::standard()));

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();
    assert_eq!(report.store.names(), vec!["eth_c".to_string()]);
    assert_eq!(report.configured, 1);
}

#[tokio::test]
async fn silent_fabric_leaves_addresses_in_place() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let cfg = l3_config(root.path());

    let host = Arc::new(three_links());
    let neighbors = Arc::new(ScriptedNeighbors::new(vec![vec![]]));
    let orchestrator = Orchestrator::new(host.clone(), neighbors);

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();

    assert_eq!(report.configured, 0);
    assert!(host.deleted().is_empty());
    assert_eq!(host.addrs("eth_a"), vec![v4(192, 192, 192, 1, 24)]);
    assert_eq!(host.addrs("eth_c"), vec![v4(10, 210, 8, 125, 30)]);
    assert!(host.routes().is_empty());
    assert!(!cfg.gaudinet.unwrap().exists());
}

#[tokio::test]
async fn unusable_descriptions_leave_addresses_in_place() {
    let root = TempDir::new().unwrap();
    three_devices(root.path());
    let cfg = l3_config(root.path());

    let host = Arc::new(three_links());
    let neighbors = Arc::new(ScriptedNeighbors::new(vec![vec![
        ("eth_a", "10.210.8.122/16"),
        ("eth_b", "unexpected port description"),
        ("eth_c", "no-alert"),
    ]]));
    let orchestrator = Orchestrator::new(host.clone(), neighbors);

    let report = orchestrator.run(&cfg, &StopSignal::never()).await.unwrap();

    assert!(host.calls(FakeOp::AddrDel).is_empty());
    assert_eq!(
        report.store.get("eth_a").unwrap().peer_addr,
        Some(Ipv4Addr::new(10, 210, 8, 122))
    );
    assert_eq!(host.admin_state("eth_a"), Some(AdminState::Down));
}
