use std::fmt::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControllerType {
    Cpu,
    Memory,
}

impl Display for ControllerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let print = match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        };

        write!(f, "{print}")
    }
}

pub const CONTROLLER_TYPES: &[ControllerType] = &[ControllerType::Cpu, ControllerType::Memory];
