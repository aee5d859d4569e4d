//! Scheduler configuration.
//!
//! The processor count and the partitioning of processors into scheduler
//! instances are fixed at start-up. They come either from code
//! ([`SystemConfig::single`]) or from boot parameters ([`parse_sched_config`]):
//!
//! ```text
//! sched.cpus=4 sched.instance=rt:priority:0-1 sched.instance=be:simple:2-3
//! sched.order.be=lifo sched.alloc=exact sched.help_limit=32 loglevel=debug
//! ```

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::logger;
use crate::scheduler::CpuIndex;

/// Upper bound on processors a configuration may name.
pub const MAX_CPUS: usize = 64;

/// Default bound on help-propagation rounds per routed request.
pub const DEFAULT_HELP_ROUND_LIMIT: usize = 16;

/// Ready-queue backend of an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueKind {
    /// One chain ordered by priority.
    Simple,
    /// One chain per priority level plus an occupancy bitmap.
    Priority,
}

/// Placement of an unblocked node among equal-priority peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    Fifo,
    Lifo,
}

/// How a processor is bound to a newly scheduled thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AllocationPolicy {
    /// Leave a thread that is still executing where it is.
    #[default]
    Lazy,
    /// Always bind the victim's processor.
    Exact,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceConfig {
    pub name: String,
    pub queue: QueueKind,
    pub processors: Vec<CpuIndex>,
    pub tie_break: TieBreak,
    pub allocation: AllocationPolicy,
}

impl InstanceConfig {
    pub fn new(name: &str, queue: QueueKind, processors: &[CpuIndex]) -> Self {
        Self {
            name: name.to_string(),
            queue,
            processors: processors.to_vec(),
            tie_break: TieBreak::Fifo,
            allocation: AllocationPolicy::Lazy,
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_allocation(mut self, allocation: AllocationPolicy) -> Self {
        self.allocation = allocation;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemConfig {
    pub processor_count: usize,
    pub instances: Vec<InstanceConfig>,
    pub help_round_limit: usize,
}

impl SystemConfig {
    /// One instance of the given backend owning every processor.
    pub fn single(processor_count: usize, queue: QueueKind) -> Self {
        let processors: Vec<CpuIndex> = (0..processor_count).collect();
        Self {
            processor_count,
            instances: alloc::vec![InstanceConfig::new("default", queue, &processors)],
            help_round_limit: DEFAULT_HELP_ROUND_LIMIT,
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.processor_count == 0 {
            return Err("processor count must be non-zero");
        }
        if self.processor_count > MAX_CPUS {
            return Err("processor count exceeds MAX_CPUS");
        }
        if self.instances.is_empty() {
            return Err("no scheduler instance configured");
        }
        if self.help_round_limit == 0 {
            return Err("help round limit must be non-zero");
        }

        let mut owned = [false; MAX_CPUS];
        for instance in &self.instances {
            if instance.processors.is_empty() {
                return Err("scheduler instance owns no processor");
            }
            for &cpu in &instance.processors {
                if cpu >= self.processor_count {
                    return Err("processor index out of range");
                }
                if owned[cpu] {
                    return Err("processor owned by two scheduler instances");
                }
                owned[cpu] = true;
            }
        }
        Ok(())
    }
}

/// Parses `sched.*` boot parameters. A `log=`/`loglevel=` token also sets the
/// maximum log level.
pub fn parse_sched_config(cmdline: &str) -> Result<SystemConfig, &'static str> {
    crate::kinfo!("Parsing scheduler configuration from cmdline: {}", cmdline);

    let mut processor_count = None;
    let mut instances: Vec<InstanceConfig> = Vec::new();
    let mut default_order = TieBreak::Fifo;
    let mut default_alloc = AllocationPolicy::Lazy;
    let mut order_overrides: Vec<(&str, TieBreak)> = Vec::new();
    let mut alloc_overrides: Vec<(&str, AllocationPolicy)> = Vec::new();
    let mut help_round_limit = DEFAULT_HELP_ROUND_LIMIT;

    for arg in cmdline.split_whitespace() {
        if let Some(value) = arg.strip_prefix("sched.cpus=") {
            let count = value.parse::<usize>().map_err(|_| "invalid sched.cpus value")?;
            processor_count = Some(count);
            crate::kinfo!("Sched config: cpus={}", count);
        } else if let Some(value) = arg.strip_prefix("sched.instance=") {
            instances.push(parse_instance(value)?);
            crate::kinfo!("Sched config: instance={}", value);
        } else if let Some(value) = arg.strip_prefix("sched.order=") {
            default_order = parse_tie_break(value)?;
            crate::kinfo!("Sched config: order={}", value);
        } else if let Some(rest) = arg.strip_prefix("sched.order.") {
            let (name, value) = rest.split_once('=').ok_or("malformed sched.order override")?;
            order_overrides.push((name, parse_tie_break(value)?));
            crate::kinfo!("Sched config: order.{}={}", name, value);
        } else if let Some(value) = arg.strip_prefix("sched.alloc=") {
            default_alloc = parse_allocation(value)?;
            crate::kinfo!("Sched config: alloc={}", value);
        } else if let Some(rest) = arg.strip_prefix("sched.alloc.") {
            let (name, value) = rest.split_once('=').ok_or("malformed sched.alloc override")?;
            alloc_overrides.push((name, parse_allocation(value)?));
            crate::kinfo!("Sched config: alloc.{}={}", name, value);
        } else if let Some(value) = arg.strip_prefix("sched.help_limit=") {
            help_round_limit = value
                .parse::<usize>()
                .map_err(|_| "invalid sched.help_limit value")?;
            crate::kinfo!("Sched config: help_limit={}", help_round_limit);
        } else if arg.starts_with("sched.") {
            crate::kwarn!("Sched config: ignoring unknown parameter {}", arg);
        }
    }

    if let Some(level) = logger::parse_level_directive(cmdline) {
        logger::set_max_level(level);
    }

    let processor_count = match processor_count {
        Some(count) => count,
        None => instances
            .iter()
            .flat_map(|instance| instance.processors.iter())
            .map(|&cpu| cpu + 1)
            .max()
            .unwrap_or(1),
    };

    if instances.is_empty() {
        let all: Vec<CpuIndex> = (0..processor_count).collect();
        instances.push(InstanceConfig::new("default", QueueKind::Simple, &all));
    }

    for instance in instances.iter_mut() {
        instance.tie_break = default_order;
        instance.allocation = default_alloc;
    }
    for (name, order) in order_overrides {
        let instance = instances
            .iter_mut()
            .find(|instance| instance.name == name)
            .ok_or("sched.order override names unknown instance")?;
        instance.tie_break = order;
    }
    for (name, allocation) in alloc_overrides {
        let instance = instances
            .iter_mut()
            .find(|instance| instance.name == name)
            .ok_or("sched.alloc override names unknown instance")?;
        instance.allocation = allocation;
    }

    let config = SystemConfig {
        processor_count,
        instances,
        help_round_limit,
    };
    config.validate()?;
    Ok(config)
}

/// `<name>:<simple|priority>:<cpu-list>`
fn parse_instance(value: &str) -> Result<InstanceConfig, &'static str> {
    let mut fields = value.splitn(3, ':');
    let name = fields.next().filter(|name| !name.is_empty()).ok_or("instance name missing")?;
    let queue = match fields.next() {
        Some(kind) if kind.eq_ignore_ascii_case("simple") => QueueKind::Simple,
        Some(kind) if kind.eq_ignore_ascii_case("priority") => QueueKind::Priority,
        Some(_) => return Err("unknown ready queue kind"),
        None => return Err("ready queue kind missing"),
    };
    let processors = parse_cpu_list(fields.next().ok_or("processor list missing")?)?;
    Ok(InstanceConfig::new(name, queue, &processors))
}

/// Parses lists such as `0-1,3`.
pub fn parse_cpu_list(list: &str) -> Result<Vec<CpuIndex>, &'static str> {
    let mut cpus = Vec::new();
    for part in list.split(',').filter(|part| !part.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = start.parse::<usize>().map_err(|_| "invalid processor range")?;
                let end = end.parse::<usize>().map_err(|_| "invalid processor range")?;
                if start > end || end >= MAX_CPUS {
                    return Err("invalid processor range");
                }
                cpus.extend(start..=end);
            }
            None => {
                let cpu = part.parse::<usize>().map_err(|_| "invalid processor index")?;
                if cpu >= MAX_CPUS {
                    return Err("invalid processor index");
                }
                cpus.push(cpu);
            }
        }
    }
    if cpus.is_empty() {
        return Err("empty processor list");
    }
    Ok(cpus)
}

fn parse_tie_break(value: &str) -> Result<TieBreak, &'static str> {
    if value.eq_ignore_ascii_case("fifo") {
        Ok(TieBreak::Fifo)
    } else if value.eq_ignore_ascii_case("lifo") {
        Ok(TieBreak::Lifo)
    } else {
        Err("unknown tie-break order")
    }
}

fn parse_allocation(value: &str) -> Result<AllocationPolicy, &'static str> {
    if value.eq_ignore_ascii_case("lazy") {
        Ok(AllocationPolicy::Lazy)
    } else if value.eq_ignore_ascii_case("exact") {
        Ok(AllocationPolicy::Exact)
    } else {
        Err("unknown allocation policy")
    }
}
