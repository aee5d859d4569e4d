//! Scheduler configuration tests

use crate::config::{
    parse_cpu_list, parse_sched_config, AllocationPolicy, InstanceConfig, QueueKind, SystemConfig,
    TieBreak, DEFAULT_HELP_ROUND_LIMIT,
};
use crate::logger::{self, LogLevel};
use serial_test::serial;

// ============================================================================
// Processor lists
// ============================================================================

#[test]
fn test_cpu_list_ranges() {
    assert_eq!(parse_cpu_list("0-1,3").unwrap(), vec![0, 1, 3]);
    assert_eq!(parse_cpu_list("2").unwrap(), vec![2]);
    assert!(parse_cpu_list("3-1").is_err());
    assert!(parse_cpu_list("x").is_err());
    assert!(parse_cpu_list("").is_err());
}

// ============================================================================
// Command line
// ============================================================================

#[test]
#[serial]
fn test_defaults_to_single_instance() {
    let config = parse_sched_config("sched.cpus=4").unwrap();
    assert_eq!(config.processor_count, 4);
    assert_eq!(config.instances.len(), 1);
    assert_eq!(config.instances[0].name, "default");
    assert_eq!(config.instances[0].queue, QueueKind::Simple);
    assert_eq!(config.instances[0].processors, vec![0, 1, 2, 3]);
    assert_eq!(config.instances[0].tie_break, TieBreak::Fifo);
    assert_eq!(config.instances[0].allocation, AllocationPolicy::Lazy);
    assert_eq!(config.help_round_limit, DEFAULT_HELP_ROUND_LIMIT);
}

#[test]
#[serial]
fn test_partitioned_instances_with_overrides() {
    let config = parse_sched_config(
        "sched.cpus=4 sched.instance=rt:priority:0-1 sched.instance=be:simple:2-3 \
         sched.order.be=lifo sched.alloc=exact sched.help_limit=8",
    )
    .unwrap();

    assert_eq!(config.instances.len(), 2);
    let rt = &config.instances[0];
    let be = &config.instances[1];
    assert_eq!((rt.name.as_str(), rt.queue), ("rt", QueueKind::Priority));
    assert_eq!(rt.processors, vec![0, 1]);
    assert_eq!(rt.tie_break, TieBreak::Fifo);
    assert_eq!(be.tie_break, TieBreak::Lifo);
    assert_eq!(rt.allocation, AllocationPolicy::Exact);
    assert_eq!(be.allocation, AllocationPolicy::Exact);
    assert_eq!(config.help_round_limit, 8);
}

#[test]
#[serial]
fn test_processor_count_inferred_from_instances() {
    let config = parse_sched_config("sched.instance=a:simple:0 sched.instance=b:simple:1-2").unwrap();
    assert_eq!(config.processor_count, 3);
}

#[test]
#[serial]
fn test_rejects_invalid_configurations() {
    assert_eq!(
        parse_sched_config("sched.cpus=2 sched.instance=a:simple:0-1 sched.instance=b:simple:1"),
        Err("processor owned by two scheduler instances")
    );
    assert_eq!(
        parse_sched_config("sched.cpus=2 sched.instance=a:simple:0-2"),
        Err("processor index out of range")
    );
    assert_eq!(
        parse_sched_config("sched.instance=a:fancy:0"),
        Err("unknown ready queue kind")
    );
    assert_eq!(
        parse_sched_config("sched.instance=a:simple:0 sched.order.b=lifo"),
        Err("sched.order override names unknown instance")
    );
    assert_eq!(parse_sched_config("sched.cpus=0"), Err("processor count must be non-zero"));
    assert_eq!(
        parse_sched_config("sched.cpus=2 sched.help_limit=0"),
        Err("help round limit must be non-zero")
    );
}

#[test]
#[serial]
fn test_loglevel_is_applied() {
    let previous = logger::max_level();
    parse_sched_config("sched.cpus=1 loglevel=debug").unwrap();
    assert_eq!(logger::max_level(), LogLevel::DEBUG);
    logger::set_max_level(previous);
}

// ============================================================================
// Programmatic construction
// ============================================================================

#[test]
fn test_single_and_builders() {
    let config = SystemConfig::single(2, QueueKind::Priority);
    assert!(config.validate().is_ok());
    assert_eq!(config.instances[0].processors, vec![0, 1]);

    let instance = InstanceConfig::new("x", QueueKind::Simple, &[0])
        .with_tie_break(TieBreak::Lifo)
        .with_allocation(AllocationPolicy::Exact);
    assert_eq!(instance.tie_break, TieBreak::Lifo);
    assert_eq!(instance.allocation, AllocationPolicy::Exact);
}

#[test]
fn test_instance_without_processors_rejected() {
    let mut config = SystemConfig::single(1, QueueKind::Simple);
    config.instances.push(InstanceConfig::new("empty", QueueKind::Simple, &[]));
    assert_eq!(config.validate(), Err("scheduler instance owns no processor"));
}
