use std::fmt::Display;

use colored::*;
use tracing::info;

use scaleout_common::config::Mode;
use scaleout_common::network::NetworkConfiguration;
use scaleout_core::orchestrator::RunReport;

use crate::terminal::colors;
use crate::terminal::logging::PRINT_TARGET;

pub const TOTAL_WIDTH: usize = 64;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, raw_msg = msg);
}

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = formatted.chars().count();

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: ColoredString = format!(
        "{}{}{}",
        "─".repeat(left),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right)
    )
    .bright_black();

    print(&format!("{}", line));
}

pub fn print_status<T: AsRef<str>>(msg: T) {
    let prefix: ColoredString = ">".color(colors::SEPARATOR);
    let message: String = format!("{} {}", prefix, msg.as_ref().color(colors::TEXT_DEFAULT));
    print(&message);
}

pub fn tree_head(idx: usize, name: &str) {
    let idx_str: String = format!("[{}]", idx.to_string().color(colors::ACCENT));
    let output: String = format!(
        "{} {}",
        idx_str.color(colors::SEPARATOR),
        name.color(colors::PRIMARY)
    );
    print(&output);
}

pub fn as_tree_one_level(key_value_pair: Vec<(String, ColoredString)>) {
    let key_width: usize = key_value_pair.iter().map(|(key, _)| key.len()).max().unwrap_or(0);

    for (i, (key, value)) in key_value_pair.iter().enumerate() {
        let last: bool = i + 1 == key_value_pair.len();
        let branch: ColoredString = if !last {
            "├─".bright_black()
        } else {
            "└─".bright_black()
        };
        let dots: String = ".".repeat(key_width + 1 - key.len());
        let output: String = format!(
            " {} {}{}{} {}",
            branch,
            key.color(colors::TEXT_DEFAULT),
            dots.color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR),
            value
        );
        print(&output);
    }
}

fn or_unknown<T: Display>(value: Option<T>, color: Color) -> ColoredString {
    match value {
        Some(value) => value.to_string().color(color),
        None => "unknown".color(colors::SEPARATOR),
    }
}

/// Tree entries describing one interface after a run.
pub fn result_pairs(mode: Mode, config: &NetworkConfiguration) -> Vec<(String, ColoredString)> {
    let mut pairs: Vec<(String, ColoredString)> =
        vec![("mac".to_string(), or_unknown(config.link.mac, colors::MAC_ADDR))];

    if mode == Mode::L3 {
        pairs.push((
            "peer mac".to_string(),
            or_unknown(config.peer_hw_addr, colors::MAC_ADDR),
        ));
        pairs.push((
            "lldp".to_string(),
            match config.port_description.as_deref() {
                Some(text) => format!("\"{text}\"").color(colors::TEXT_DEFAULT),
                None => "no response".color(colors::WARNING),
            },
        ));
        pairs.push(("peer".to_string(), or_unknown(config.peer_addr, colors::IPV4_ADDR)));
        pairs.push(("local".to_string(), or_unknown(config.local_addr, colors::IPV4_ADDR)));
    }

    pairs.push(("state".to_string(), or_unknown(config.admin_state, colors::ACCENT)));
    pairs
}

/// Prints the per-interface outcome of a run.
pub fn log_results(report: &RunReport) {
    header("results");

    if report.store.is_empty() {
        print_status("no interfaces found");
        return;
    }

    for (idx, (name, config)) in report.store.iter().enumerate() {
        tree_head(idx, name);
        as_tree_one_level(result_pairs(report.mode, config));
    }

    if report.mode == Mode::L3 {
        print_status(format!(
            "{}/{} interfaces configured",
            report.configured,
            report.store.len()
        ));
        if let Some(path) = &report.address_map {
            print_status(format!("address map written to {}", path.display()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaleout_common::network::{ConfigStore, Link};
    use std::net::Ipv4Addr;

    fn report(mode: Mode) -> RunReport {
        let mut configured = NetworkConfiguration::new(Link::new("eth_a", 2))
            .with_port_description("no-alert 10.210.8.122/30");
        configured.peer_addr = Some(Ipv4Addr::new(10, 210, 8, 122));
        configured.local_addr = Some(Ipv4Addr::new(10, 210, 8, 121));

        let store: ConfigStore = vec![configured, NetworkConfiguration::new(Link::new("eth_b", 3))]
            .into_iter()
            .collect();

        RunReport {
            mode,
            store,
            configured: 1,
            address_map: None,
        }
    }

    #[test]
    fn result_pairs_depend_on_mode() {
        let report = report(Mode::L2);
        let config = report.store.get("eth_a").unwrap();

        let l2: Vec<String> = result_pairs(Mode::L2, config).into_iter().map(|(k, _)| k).collect();
        assert_eq!(l2, vec!["mac", "state"]);

        let l3: Vec<String> = result_pairs(Mode::L3, config).into_iter().map(|(k, _)| k).collect();
        assert_eq!(l3, vec!["mac", "peer mac", "lldp", "peer", "local", "state"]);
    }

    #[test]
    fn log_results_runs_for_both_modes() {
        log_results(&report(Mode::L2));
        log_results(&report(Mode::L3));
    }
}
