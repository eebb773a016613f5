//! Displays the processes inside the container, read from cgroup.procs
use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use libkontainer::cgroups;

use crate::cli::Ps;
use crate::commands::load_container;

pub fn ps(args: Ps, root_path: PathBuf) -> Result<()> {
    let container = load_container(root_path, &args.container_id)?;
    let config = container
        .config()
        .context("could not load container config")?;
    let cgroup_path = config
        .cgroup_path
        .context("container has no cgroup path recorded")?;

    let cmanager = cgroups::Manager::new(&cgroup_path);
    let pids: Vec<i32> = cmanager
        .get_pids()?
        .iter()
        .map(|pid| pid.as_raw())
        .collect();

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string(&pids)?),
        "table" => print_table(&pids, &args.ps_options)?,
        format => bail!("unknown ps format: {format}"),
    }

    Ok(())
}

fn print_table(pids: &[i32], ps_options: &[String]) -> Result<()> {
    let default_ps_options = vec![String::from("-ef")];
    let ps_options = if ps_options.is_empty() {
        &default_ps_options
    } else {
        ps_options
    };

    let output = Command::new("ps").args(ps_options).output()?;
    if !output.status.success() {
        println!("{}", std::str::from_utf8(&output.stderr)?);
        return Ok(());
    }

    let lines = std::str::from_utf8(&output.stdout)?;
    let lines: Vec<&str> = lines.split('\n').collect();
    let pid_index = get_pid_index(lines[0])?;
    println!("{}", &lines[0]);
    for line in &lines[1..] {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let pid: i32 = fields[pid_index].parse()?;
        if pids.contains(&pid) {
            println!("{line}");
        }
    }

    Ok(())
}

fn get_pid_index(title: &str) -> Result<usize> {
    let titles = title.split_whitespace();

    for (index, name) in titles.enumerate() {
        if name == "PID" {
            return Ok(index);
        }
    }
    bail!("could not find the PID field in ps output");
}
