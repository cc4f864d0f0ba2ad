//! 仿真组件硬件
//!
//! 每个组件按类型产生读数：传感器输出缓慢变化的测量值，执行器跟随设定值，
//! 指示器回显亮度。可以注入缺失、静默和故障，用来演练节点的安全路径。

use hat_node::{ComponentKind, ComponentSpec, HardwareDriver, HardwareFault};
use hat_protocol::ComponentConfig;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone)]
struct SimComponent {
    kind: ComponentKind,
    /// 执行器设定值 / 指示器亮度 / 传感器采样周期
    parameter: i32,
    output: f32,
    ticks: u32,
    silenced: bool,
    faulted: bool,
}

impl SimComponent {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            parameter: 0,
            output: 0.0,
            ticks: 0,
            silenced: false,
            faulted: false,
        }
    }

    fn sample(&mut self, address: u16) -> f32 {
        self.ticks = self.ticks.wrapping_add(1);
        match self.kind {
            ComponentKind::Sensor => {
                // 以地址为基准的锯齿波，便于在日志里区分组件
                let base = f32::from(address & 0xFF);
                base + (self.ticks % 50) as f32 * 0.1
            },
            ComponentKind::Actuator => {
                // 一阶逼近设定值
                let target = self.parameter as f32;
                self.output += (target - self.output) * 0.25;
                self.output
            },
            ComponentKind::Indicator => self.output,
        }
    }
}

/// 仿真硬件后端
#[derive(Debug, Default)]
pub struct SimulatedHardware {
    components: HashMap<u16, SimComponent>,
    missing: HashSet<u16>,
}

impl SimulatedHardware {
    /// 按硬件映射装配组件
    pub fn from_specs(specs: &[ComponentSpec]) -> Self {
        let components = specs
            .iter()
            .map(|spec| (spec.address, SimComponent::new(spec.kind)))
            .collect();
        Self {
            components,
            missing: HashSet::new(),
        }
    }

    /// 探测时不应答（模拟未插好的组件）
    pub fn with_missing(mut self, addresses: impl IntoIterator<Item = u16>) -> Self {
        self.missing.extend(addresses);
        self
    }

    /// 停止 / 恢复上报
    pub fn set_silenced(&mut self, address: u16, silenced: bool) -> bool {
        match self.components.get_mut(&address) {
            Some(component) => {
                component.silenced = silenced;
                true
            },
            None => false,
        }
    }

    /// 注入 / 清除硬件故障
    pub fn set_faulted(&mut self, address: u16, faulted: bool) -> bool {
        match self.components.get_mut(&address) {
            Some(component) => {
                component.faulted = faulted;
                true
            },
            None => false,
        }
    }

    #[cfg(test)]
    fn output(&self, address: u16) -> Option<f32> {
        self.components.get(&address).map(|c| c.output)
    }

    fn component(&mut self, address: u16, code: u8) -> Result<&mut SimComponent, HardwareFault> {
        match self.components.get_mut(&address) {
            Some(component) if component.faulted => Err(HardwareFault(code)),
            Some(component) => Ok(component),
            None => Err(HardwareFault(code)),
        }
    }
}

impl HardwareDriver for SimulatedHardware {
    fn probe(&mut self, address: u16, kind: ComponentKind) -> bool {
        if self.missing.contains(&address) {
            return false;
        }
        self.components
            .entry(address)
            .or_insert_with(|| SimComponent::new(kind));
        true
    }

    fn apply_state(&mut self, address: u16, state: u8) -> Result<(), HardwareFault> {
        let component = self.component(address, 0x01)?;
        if component.kind == ComponentKind::Indicator {
            component.output = f32::from(state);
        }
        Ok(())
    }

    fn clear_outputs(&mut self, address: u16) -> Result<(), HardwareFault> {
        let component = self.component(address, 0x02)?;
        component.parameter = 0;
        component.output = 0.0;
        Ok(())
    }

    fn apply_config(
        &mut self,
        address: u16,
        config: &ComponentConfig,
    ) -> Result<(), HardwareFault> {
        let component = self.component(address, 0x03)?;
        if let Some(parameter) = config.parameter {
            component.parameter = parameter;
            if component.kind == ComponentKind::Indicator {
                component.output = parameter as f32;
            }
        }
        debug!("sim 0x{:04X} config {:?}", address, config);
        Ok(())
    }

    fn calibrate(&mut self, address: u16) -> Result<(), HardwareFault> {
        self.component(address, HardwareFault::CALIBRATION_FAILED)
            .map(|c| c.ticks = 0)
    }

    fn self_test(&mut self, address: u16) -> Result<(), HardwareFault> {
        self.component(address, HardwareFault::SELF_TEST_FAILED)
            .map(|_| ())
    }

    fn force_safe_output(&mut self, address: u16) -> Result<(), HardwareFault> {
        // 故障组件也要尽量回到安全输出，然后再报告故障
        let Some(component) = self.components.get_mut(&address) else {
            return Err(HardwareFault(0x04));
        };
        component.parameter = 0;
        component.output = 0.0;
        if component.faulted {
            Err(HardwareFault(0x04))
        } else {
            Ok(())
        }
    }

    fn reset(&mut self, address: u16) -> Result<(), HardwareFault> {
        let component = self.component(address, 0x05)?;
        *component = SimComponent::new(component.kind);
        Ok(())
    }

    fn poll(&mut self, address: u16) -> Option<f32> {
        let component = self.components.get_mut(&address)?;
        if component.silenced {
            return None;
        }
        Some(component.sample(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hardware() -> SimulatedHardware {
        SimulatedHardware::from_specs(&[
            ComponentSpec::new(0x10, ComponentKind::Sensor),
            ComponentSpec::new(0x20, ComponentKind::Actuator),
            ComponentSpec::new(0x30, ComponentKind::Indicator),
        ])
    }

    #[test]
    fn test_missing_component_fails_probe() {
        let mut hw = hardware().with_missing([0x20]);
        assert!(hw.probe(0x10, ComponentKind::Sensor));
        assert!(!hw.probe(0x20, ComponentKind::Actuator));
    }

    #[test]
    fn test_actuator_tracks_setpoint_and_safe_output_zeroes_it() {
        let mut hw = hardware();
        hw.apply_config(0x20, &ComponentConfig::new(1).with_parameter(100))
            .unwrap();
        for _ in 0..20 {
            hw.poll(0x20);
        }
        assert!(hw.output(0x20).unwrap() > 90.0);

        hw.force_safe_output(0x20).unwrap();
        assert_eq!(hw.output(0x20), Some(0.0));
    }

    #[test]
    fn test_silenced_component_stops_reporting() {
        let mut hw = hardware();
        assert!(hw.poll(0x10).is_some());
        assert!(hw.set_silenced(0x10, true));
        assert_eq!(hw.poll(0x10), None);
        assert!(!hw.set_silenced(0x99, true));
    }

    #[test]
    fn test_fault_injection() {
        let mut hw = hardware();
        hw.set_faulted(0x10, true);
        assert_eq!(
            hw.calibrate(0x10),
            Err(HardwareFault(HardwareFault::CALIBRATION_FAILED))
        );
        assert_eq!(
            hw.self_test(0x10),
            Err(HardwareFault(HardwareFault::SELF_TEST_FAILED))
        );
        hw.set_faulted(0x10, false);
        assert!(hw.self_test(0x10).is_ok());
    }
}
