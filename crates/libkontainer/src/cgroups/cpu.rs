use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};

use super::common;
use super::controller::Controller;
use crate::spec::{LinuxCpu, LinuxResources};

const CGROUP_CPU_WEIGHT: &str = "cpu.weight";
const CGROUP_CPU_MAX: &str = "cpu.max";
const UNRESTRICTED_QUOTA: &str = "max";
const MAX_CPU_WEIGHT: i64 = 10000;

pub struct Cpu {}

impl Controller for Cpu {
    fn apply(resources: &LinuxResources, path: &Path) -> Result<()> {
        if let Some(cpu) = &resources.cpu {
            Self::apply(path, cpu).context("failed to apply cpu resource restrictions")?;
        }

        Ok(())
    }
}

impl Cpu {
    fn apply(path: &Path, cpu: &LinuxCpu) -> Result<()> {
        if let Some(shares) = cpu.shares {
            let weight = Self::convert_shares_to_cgroup2(shares);
            if weight != 0 {
                // a zero weight would come back as Errno 34 (numerical
                // result out of range)
                common::write_cgroup_file(path.join(CGROUP_CPU_WEIGHT), weight)?;
            }
        }

        let cpu_max_file = path.join(CGROUP_CPU_MAX);
        let new_cpu_max: Option<Cow<str>> = match (cpu.quota, cpu.period) {
            (None, Some(period)) => Self::create_period_only_value(&cpu_max_file, period)?,
            (Some(quota), None) if quota >= 0 => Some(quota.to_string().into()),
            (Some(quota), None) if quota < 0 => Some(UNRESTRICTED_QUOTA.into()),
            (Some(quota), Some(period)) if quota >= 0 => Some(format!("{quota} {period}").into()),
            (Some(quota), Some(period)) if quota < 0 => {
                Some(format!("{UNRESTRICTED_QUOTA} {period}").into())
            }
            _ => None,
        };

        // format is 'quota period'
        // the kernel default is 'max 100000'
        // 250000 250000 -> 1 CPU worth of runtime every 250ms
        // 10000 50000 -> 20% of one CPU every 50ms
        if let Some(cpu_max) = new_cpu_max {
            common::write_cgroup_file_str(&cpu_max_file, &cpu_max)?;
        }

        Ok(())
    }

    // cgroup v1 shares [2..262144] map onto the v2 weight range [1..10000].
    fn convert_shares_to_cgroup2(shares: u64) -> u64 {
        if shares == 0 {
            return 0;
        }

        let weight = 1 + ((shares as i64 - 2) * 9999) / 262142;
        weight.clamp(1, MAX_CPU_WEIGHT) as u64
    }

    fn create_period_only_value(cpu_max_file: &Path, period: u64) -> Result<Option<Cow<str>>> {
        let old_cpu_max = common::read_cgroup_file(cpu_max_file)?;
        if let Some(old_quota) = old_cpu_max.split_whitespace().next() {
            return Ok(Some(format!("{old_quota} {period}").into()));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroups::common::test::set_fixture;
    use std::fs;

    #[test]
    fn test_set_valid_shares() {
        let tmp = tempfile::tempdir().unwrap();
        let weight = set_fixture(tmp.path(), CGROUP_CPU_WEIGHT, "").unwrap();
        set_fixture(tmp.path(), CGROUP_CPU_MAX, "").unwrap();
        let cpu = LinuxCpu {
            shares: Some(22000),
            ..Default::default()
        };

        Cpu::apply(tmp.path(), &cpu).expect("apply cpu");

        let content = fs::read_to_string(weight).expect("read cpu.weight");
        assert_eq!(content, 840.to_string());
    }

    #[test]
    fn test_shares_below_two_clamp_to_minimum_weight() {
        assert_eq!(Cpu::convert_shares_to_cgroup2(1), 1);
        assert_eq!(Cpu::convert_shares_to_cgroup2(2), 1);
        assert_eq!(Cpu::convert_shares_to_cgroup2(0), 0);
        assert_eq!(Cpu::convert_shares_to_cgroup2(u64::MAX), 10000);
    }

    #[test]
    fn test_set_positive_quota() {
        const QUOTA: i64 = 200000;
        let tmp = tempfile::tempdir().unwrap();
        let max = set_fixture(tmp.path(), CGROUP_CPU_MAX, "").unwrap();
        let cpu = LinuxCpu {
            quota: Some(QUOTA),
            ..Default::default()
        };

        Cpu::apply(tmp.path(), &cpu).expect("apply cpu");

        let content = fs::read_to_string(max).expect("read cpu.max");
        assert_eq!(content, format!("{QUOTA}"))
    }

    #[test]
    fn test_set_negative_quota() {
        let tmp = tempfile::tempdir().unwrap();
        let max = set_fixture(tmp.path(), CGROUP_CPU_MAX, "").unwrap();
        let cpu = LinuxCpu {
            quota: Some(-500),
            ..Default::default()
        };

        Cpu::apply(tmp.path(), &cpu).expect("apply cpu");

        let content = fs::read_to_string(max).expect("read cpu.max");
        assert_eq!(content, UNRESTRICTED_QUOTA)
    }

    #[test]
    fn test_set_quota_and_period() {
        let tmp = tempfile::tempdir().unwrap();
        let max = set_fixture(tmp.path(), CGROUP_CPU_MAX, "").unwrap();
        let cpu = LinuxCpu {
            quota: Some(50000),
            period: Some(100000),
            ..Default::default()
        };

        Cpu::apply(tmp.path(), &cpu).expect("apply cpu");

        let content = fs::read_to_string(max).expect("read cpu.max");
        assert_eq!(content, "50000 100000");
    }

    #[test]
    fn test_set_period_only_keeps_old_quota() {
        let tmp = tempfile::tempdir().unwrap();
        let max = set_fixture(tmp.path(), CGROUP_CPU_MAX, "max 100000").unwrap();
        let cpu = LinuxCpu {
            period: Some(250000),
            ..Default::default()
        };

        Cpu::apply(tmp.path(), &cpu).expect("apply cpu");

        let content = fs::read_to_string(max).expect("read cpu.max");
        assert_eq!(content, "max 250000");
    }
}
