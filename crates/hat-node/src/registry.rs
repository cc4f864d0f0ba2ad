//! # 组件表 (Component Registry)
//!
//! 固定容量的组件表，按 16-bit 地址索引。初始化后不再增删记录，
//! "移除"组件即失能。组件表不关心 CAN 帧格式。
//!
//! ## 在线判定
//!
//! `responding` 标志只能由 `record_update` 置位，读取时再结合
//! `liveness_timeout_ms` 惰性判定：
//!
//! ```text
//! live = responding && now - last_update <= liveness_timeout
//! ```

use crate::config::{ComponentKind, ComponentSpec};
use crate::error::HatError;
use crate::hardware::{HardwareDriver, HardwareFault};
use hat_protocol::{COMPONENT_STATE_UNKNOWN, ComponentConfig};
use tracing::{debug, error, info, trace, warn};

/// 组件数量上限
pub const HAT_MAX_COMPONENTS: usize = 16;

/// 组件记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentRecord {
    pub address: u16,
    pub kind: ComponentKind,
    pub mandatory: bool,
    pub safe_mode_exempt: bool,
    /// 组件自定义状态，`0xFF` 为未知
    pub state: u8,
    pub enabled: bool,
    /// 原始在线标志（未考虑超时）
    responding: bool,
    /// 初始化 / 复位后是否上报过
    reported: bool,
    pub last_update_ms: u64,
    pub value: f32,
    pub error_code: u8,
}

impl ComponentRecord {
    fn from_spec(spec: &ComponentSpec) -> Self {
        Self {
            address: spec.address,
            kind: spec.kind,
            mandatory: spec.mandatory,
            safe_mode_exempt: spec.safe_mode_exempt,
            state: COMPONENT_STATE_UNKNOWN,
            enabled: false,
            responding: false,
            reported: false,
            last_update_ms: 0,
            value: 0.0,
            error_code: HardwareFault::NONE,
        }
    }

    fn is_live(&self, now_ms: u64, timeout_ms: u64) -> bool {
        self.responding && now_ms.saturating_sub(self.last_update_ms) <= timeout_ms
    }

    fn apply_update(&mut self, value: f32, responding: bool, now_ms: u64) {
        self.value = value;
        self.responding = responding;
        self.reported = true;
        self.last_update_ms = now_ms;
    }

    fn reset(&mut self) {
        self.state = COMPONENT_STATE_UNKNOWN;
        self.enabled = false;
        self.responding = false;
        self.reported = false;
        self.value = 0.0;
        self.error_code = HardwareFault::NONE;
    }
}

/// 组件状态快照（`responding` 已按当前时间判定）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentStatus {
    pub address: u16,
    pub state: u8,
    pub enabled: bool,
    pub responding: bool,
    pub last_update_ms: u64,
    pub value: f32,
    pub error_code: u8,
}

/// 组件表
pub struct ComponentRegistry<H: HardwareDriver> {
    hardware: H,
    components: heapless::Vec<ComponentRecord, HAT_MAX_COMPONENTS>,
    liveness_timeout_ms: u64,
    initialized: bool,
}

impl<H: HardwareDriver> ComponentRegistry<H> {
    pub fn new(hardware: H, liveness_timeout_ms: u64) -> Self {
        Self {
            hardware,
            components: heapless::Vec::new(),
            liveness_timeout_ms,
            initialized: false,
        }
    }

    /// 按硬件映射初始化组件表
    ///
    /// 逐个探测组件；探测到的数量少于声明数量时返回
    /// `DiscoveryIncomplete`，组件表保持未初始化。
    pub fn initialize(&mut self, specs: &[ComponentSpec]) -> Result<usize, HatError> {
        self.initialized = false;
        self.components.clear();

        if specs.len() > HAT_MAX_COMPONENTS {
            return Err(HatError::CapacityExceeded {
                count: specs.len(),
                max: HAT_MAX_COMPONENTS,
            });
        }

        for spec in specs {
            if self.index_of(spec.address).is_some() {
                self.components.clear();
                return Err(HatError::DuplicateAddress {
                    address: spec.address,
                });
            }

            if !self.hardware.probe(spec.address, spec.kind) {
                warn!(
                    "Component 0x{:04X} ({:?} '{}') did not answer probe",
                    spec.address, spec.kind, spec.name
                );
                continue;
            }

            // 容量已在上面检查过，这里不会失败
            if self.components.push(ComponentRecord::from_spec(spec)).is_err() {
                return Err(HatError::CapacityExceeded {
                    count: specs.len(),
                    max: HAT_MAX_COMPONENTS,
                });
            }
            debug!(
                "Component 0x{:04X} ({:?} '{}') registered",
                spec.address, spec.kind, spec.name
            );
        }

        let found = self.components.len();
        if found < specs.len() {
            self.components.clear();
            return Err(HatError::DiscoveryIncomplete {
                expected: specs.len(),
                found,
            });
        }

        self.initialized = true;
        info!("Component registry initialized with {} components", found);
        Ok(found)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn liveness_timeout_ms(&self) -> u64 {
        self.liveness_timeout_ms
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    fn index_of(&self, address: u16) -> Option<usize> {
        self.components.iter().position(|c| c.address == address)
    }

    fn index_or_err(&self, address: u16) -> Result<usize, HatError> {
        self.index_of(address)
            .ok_or(HatError::AddressNotFound { address })
    }

    /// 组件记录（只读）
    pub fn record(&self, address: u16) -> Result<&ComponentRecord, HatError> {
        let idx = self.index_or_err(address)?;
        Ok(&self.components[idx])
    }

    pub fn records(&self) -> impl Iterator<Item = &ComponentRecord> {
        self.components.iter()
    }

    // ------------------------------------------------------------------
    // 组件控制
    // ------------------------------------------------------------------

    /// 设置组件状态（不改变使能）
    pub fn set_state(&mut self, address: u16, state: u8) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        let record = &mut self.components[idx];

        if let Err(fault) = self.hardware.apply_state(address, state) {
            record.error_code = fault.code();
            warn!("Component 0x{:04X} rejected state 0x{:02X}: {}", address, state, fault);
            return Err(HatError::ComponentFault {
                address,
                code: fault.code(),
            });
        }

        record.state = state;
        debug!("Component 0x{:04X} state -> 0x{:02X}", address, state);
        Ok(())
    }

    pub fn get_state(&self, address: u16) -> Result<u8, HatError> {
        Ok(self.record(address)?.state)
    }

    pub fn enable(&mut self, address: u16) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        self.components[idx].enabled = true;
        debug!("Component 0x{:04X} enabled", address);
        Ok(())
    }

    /// 失能组件并清除其输出
    ///
    /// 即使清除输出失败，失能意图也会被记录。
    pub fn disable(&mut self, address: u16) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        let record = &mut self.components[idx];
        record.enabled = false;
        debug!("Component 0x{:04X} disabled", address);

        if let Err(fault) = self.hardware.clear_outputs(address) {
            record.error_code = fault.code();
            warn!("Component 0x{:04X} failed to clear outputs: {}", address, fault);
            return Err(HatError::ComponentFault {
                address,
                code: fault.code(),
            });
        }
        Ok(())
    }

    /// 按组件类型校验并应用配置；成功后组件状态变为配置的模式
    pub fn configure(&mut self, address: u16, config: &ComponentConfig) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        let record = &mut self.components[idx];

        record
            .kind
            .validate(config)
            .map_err(|reason| HatError::InvalidConfig { address, reason })?;

        if let Err(fault) = self.hardware.apply_config(address, config) {
            record.error_code = fault.code();
            return Err(HatError::ComponentFault {
                address,
                code: fault.code(),
            });
        }

        record.state = config.mode;
        debug!(
            "Component 0x{:04X} configured: mode={}, parameter={:?}",
            address, config.mode, config.parameter
        );
        Ok(())
    }

    pub fn calibrate(&mut self, address: u16) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        let result = self.hardware.calibrate(address);
        Self::record_outcome(&mut self.components[idx], result)
    }

    /// 组件自检
    pub fn test(&mut self, address: u16) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        let result = self.hardware.self_test(address);
        Self::record_outcome(&mut self.components[idx], result)
    }

    fn record_outcome(
        record: &mut ComponentRecord,
        result: Result<(), HardwareFault>,
    ) -> Result<(), HatError> {
        match result {
            Ok(()) => {
                record.error_code = HardwareFault::NONE;
                Ok(())
            },
            Err(fault) => {
                record.error_code = fault.code();
                warn!("Component 0x{:04X}: {}", record.address, fault);
                Err(HatError::ComponentFault {
                    address: record.address,
                    code: fault.code(),
                })
            },
        }
    }

    /// 记录组件上报（唯一能把 `responding` 置位的入口）
    pub fn record_update(
        &mut self,
        address: u16,
        value: f32,
        responding: bool,
        now_ms: u64,
    ) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        self.components[idx].apply_update(value, responding, now_ms);
        trace!(
            "Component 0x{:04X} update: value={}, responding={}",
            address, value, responding
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // 安全功能
    // ------------------------------------------------------------------

    /// 急停：所有已使能组件强制安全输出并失能
    ///
    /// 不会失败；单个组件的故障写入其 `error_code`。返回实际停止的组件数。
    pub fn emergency_stop(&mut self) -> usize {
        let stopped = self.sweep_to_safe(false);
        error!("Emergency stop: {} component(s) forced to safe output", stopped);
        stopped
    }

    /// 安全模式：同急停，但 `safe_mode_exempt` 组件保持原使能状态
    pub fn enter_safe_mode(&mut self) -> usize {
        let stopped = self.sweep_to_safe(true);
        warn!("Safe mode: {} component(s) forced to safe output", stopped);
        stopped
    }

    fn sweep_to_safe(&mut self, honour_exemptions: bool) -> usize {
        let mut stopped = 0;
        for record in self.components.iter_mut() {
            if !record.enabled || (honour_exemptions && record.safe_mode_exempt) {
                continue;
            }
            // 失败也要失能，但只有到达安全输出的才计数
            match self.hardware.force_safe_output(record.address) {
                Ok(()) => stopped += 1,
                Err(fault) => {
                    record.error_code = fault.code();
                    error!(
                        "Component 0x{:04X} failed to reach safe output: {}",
                        record.address, fault
                    );
                },
            }
            record.enabled = false;
        }
        stopped
    }

    // ------------------------------------------------------------------
    // 状态与监控
    // ------------------------------------------------------------------

    fn snapshot(&self, record: &ComponentRecord, now_ms: u64) -> ComponentStatus {
        ComponentStatus {
            address: record.address,
            state: record.state,
            enabled: record.enabled,
            responding: record.is_live(now_ms, self.liveness_timeout_ms),
            last_update_ms: record.last_update_ms,
            value: record.value,
            error_code: record.error_code,
        }
    }

    pub fn status(&self, address: u16, now_ms: u64) -> Result<ComponentStatus, HatError> {
        let record = self.record(address)?;
        Ok(self.snapshot(record, now_ms))
    }

    pub fn statuses(&self, now_ms: u64) -> heapless::Vec<ComponentStatus, HAT_MAX_COMPONENTS> {
        self.components
            .iter()
            .map(|r| self.snapshot(r, now_ms))
            .collect()
    }

    pub fn is_responding(&self, address: u16, now_ms: u64) -> Result<bool, HatError> {
        Ok(self
            .record(address)?
            .is_live(now_ms, self.liveness_timeout_ms))
    }

    /// 心跳位图：Bit i 表示第 i 个组件在线
    pub fn responding_bitmap(&self, now_ms: u64) -> u32 {
        self.components
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_live(now_ms, self.liveness_timeout_ms))
            .fold(0u32, |acc, (i, _)| acc | (1 << i))
    }

    /// 轮询所有组件的测量值，返回有新数据的组件数
    ///
    /// 读数经 `record_update` 写入组件表。
    pub fn poll_components(&mut self, now_ms: u64) -> usize {
        let mut updated = 0;
        for idx in 0..self.components.len() {
            let address = self.components[idx].address;
            if let Some(value) = self.hardware.poll(address) {
                if self.record_update(address, value, true, now_ms).is_ok() {
                    updated += 1;
                }
            }
        }
        updated
    }

    /// 强制组件检查
    ///
    /// 返回第一个不在线（`require_enabled` 时还包括未使能）的强制组件地址。
    pub fn check_mandatory(&self, now_ms: u64, require_enabled: bool) -> Result<(), u16> {
        match self.components.iter().find(|r| {
            r.mandatory
                && (!r.is_live(now_ms, self.liveness_timeout_ms) || (require_enabled && !r.enabled))
        }) {
            Some(record) => Err(record.address),
            None => Ok(()),
        }
    }

    /// 上报过但已超时的强制组件
    ///
    /// 从未上报的组件不算"丢失"：它们会挡住 RUNNING，但不会单独触发 SAFE。
    pub fn mandatory_liveness_lost(&self, now_ms: u64) -> Option<u16> {
        self.components
            .iter()
            .find(|r| r.mandatory && r.reported && !r.is_live(now_ms, self.liveness_timeout_ms))
            .map(|r| r.address)
    }

    // ------------------------------------------------------------------
    // 维护
    // ------------------------------------------------------------------

    /// 复位单个组件：状态未知、失能、清除故障码
    pub fn reset_component(&mut self, address: u16) -> Result<(), HatError> {
        let idx = self.index_or_err(address)?;
        let record = &mut self.components[idx];
        record.reset();

        if let Err(fault) = self.hardware.reset(address) {
            record.error_code = fault.code();
            warn!("Component 0x{:04X} reset failed: {}", address, fault);
            return Err(HatError::ComponentFault {
                address,
                code: fault.code(),
            });
        }
        debug!("Component 0x{:04X} reset", address);
        Ok(())
    }

    /// 复位所有组件，返回复位失败的组件数
    pub fn reset_all_components(&mut self) -> usize {
        let mut failed = 0;
        for record in self.components.iter_mut() {
            record.reset();
            if let Err(fault) = self.hardware.reset(record.address) {
                record.error_code = fault.code();
                warn!("Component 0x{:04X} reset failed: {}", record.address, fault);
                failed += 1;
            }
        }
        info!(
            "All components reset ({} of {} failed)",
            failed,
            self.components.len()
        );
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeHardware {
        absent: HashSet<u16>,
        faulty: HashSet<u16>,
        safe_outputs: Vec<u16>,
        cleared: Vec<u16>,
        readings: Vec<(u16, f32)>,
    }

    impl HardwareDriver for FakeHardware {
        fn probe(&mut self, address: u16, _kind: ComponentKind) -> bool {
            !self.absent.contains(&address)
        }

        fn apply_state(&mut self, address: u16, _state: u8) -> Result<(), HardwareFault> {
            if self.faulty.contains(&address) {
                Err(HardwareFault(0x42))
            } else {
                Ok(())
            }
        }

        fn clear_outputs(&mut self, address: u16) -> Result<(), HardwareFault> {
            self.cleared.push(address);
            if self.faulty.contains(&address) {
                Err(HardwareFault(0x43))
            } else {
                Ok(())
            }
        }

        fn calibrate(&mut self, address: u16) -> Result<(), HardwareFault> {
            if self.faulty.contains(&address) {
                Err(HardwareFault(HardwareFault::CALIBRATION_FAILED))
            } else {
                Ok(())
            }
        }

        fn force_safe_output(&mut self, address: u16) -> Result<(), HardwareFault> {
            self.safe_outputs.push(address);
            if self.faulty.contains(&address) {
                Err(HardwareFault(0x44))
            } else {
                Ok(())
            }
        }

        fn poll(&mut self, address: u16) -> Option<f32> {
            self.readings
                .iter()
                .find(|(a, _)| *a == address)
                .map(|(_, v)| *v)
        }
    }

    fn specs() -> Vec<ComponentSpec> {
        vec![
            ComponentSpec::new(0x10, ComponentKind::Sensor).mandatory(),
            ComponentSpec::new(0x20, ComponentKind::Actuator).mandatory(),
            ComponentSpec::new(0x30, ComponentKind::Indicator).safe_mode_exempt(),
        ]
    }

    fn registry() -> ComponentRegistry<FakeHardware> {
        let mut registry = ComponentRegistry::new(FakeHardware::default(), 500);
        registry.initialize(&specs()).unwrap();
        registry
    }

    #[test]
    fn test_initialize_populates_unknown_records() {
        let registry = registry();
        assert!(registry.is_initialized());
        assert_eq!(registry.component_count(), 3);
        for record in registry.records() {
            assert_eq!(record.state, COMPONENT_STATE_UNKNOWN);
            assert!(!record.enabled);
        }
        assert!(!registry.is_responding(0x10, 0).unwrap());
    }

    #[test]
    fn test_initialize_discovery_incomplete() {
        let mut hw = FakeHardware::default();
        hw.absent.insert(0x20);
        let mut registry = ComponentRegistry::new(hw, 500);
        let err = registry.initialize(&specs()).unwrap_err();
        assert!(matches!(
            err,
            HatError::DiscoveryIncomplete {
                expected: 3,
                found: 2
            }
        ));
        assert!(!registry.is_initialized());
        assert_eq!(registry.component_count(), 0);
    }

    #[test]
    fn test_initialize_rejects_duplicates_and_overflow() {
        let mut registry = ComponentRegistry::new(FakeHardware::default(), 500);
        let dup = vec![
            ComponentSpec::new(0x10, ComponentKind::Sensor),
            ComponentSpec::new(0x10, ComponentKind::Sensor),
        ];
        assert!(matches!(
            registry.initialize(&dup),
            Err(HatError::DuplicateAddress { address: 0x10 })
        ));

        let many: Vec<_> = (0..17u16)
            .map(|a| ComponentSpec::new(a, ComponentKind::Sensor))
            .collect();
        assert!(matches!(
            registry.initialize(&many),
            Err(HatError::CapacityExceeded { count: 17, max: 16 })
        ));
    }

    #[test]
    fn test_set_state_does_not_enable() {
        let mut registry = registry();
        registry.set_state(0x20, 0x07).unwrap();
        assert_eq!(registry.get_state(0x20).unwrap(), 0x07);
        assert!(!registry.record(0x20).unwrap().enabled);
    }

    #[test]
    fn test_set_state_hardware_fault() {
        let mut registry = registry();
        registry.hardware_mut().faulty.insert(0x20);
        let err = registry.set_state(0x20, 0x01).unwrap_err();
        assert!(matches!(
            err,
            HatError::ComponentFault {
                address: 0x20,
                code: 0x42
            }
        ));
        assert_eq!(registry.get_state(0x20).unwrap(), COMPONENT_STATE_UNKNOWN);
        assert_eq!(registry.record(0x20).unwrap().error_code, 0x42);
    }

    #[test]
    fn test_unknown_address() {
        let mut registry = registry();
        assert!(matches!(
            registry.get_state(0x99),
            Err(HatError::AddressNotFound { address: 0x99 })
        ));
        assert!(registry.enable(0x99).is_err());
        assert!(registry.record_update(0x99, 1.0, true, 0).is_err());
    }

    #[test]
    fn test_disable_records_intent_even_on_fault() {
        let mut registry = registry();
        registry.enable(0x20).unwrap();
        registry.hardware_mut().faulty.insert(0x20);
        assert!(registry.disable(0x20).is_err());
        assert!(!registry.record(0x20).unwrap().enabled);
        assert_eq!(registry.hardware().cleared, vec![0x20]);
    }

    #[test]
    fn test_configure_validates_kind() {
        let mut registry = registry();
        let bad = ComponentConfig::new(3);
        assert!(matches!(
            registry.configure(0x20, &bad),
            Err(HatError::InvalidConfig { address: 0x20, .. })
        ));
        assert_eq!(registry.get_state(0x20).unwrap(), COMPONENT_STATE_UNKNOWN);

        let good = ComponentConfig::new(2).with_parameter(-500);
        registry.configure(0x20, &good).unwrap();
        assert_eq!(registry.get_state(0x20).unwrap(), 2);
        assert_eq!(registry.record(0x20).unwrap().value, 0.0);
    }

    #[test]
    fn test_calibrate_records_outcome() {
        let mut registry = registry();
        registry.calibrate(0x10).unwrap();
        assert_eq!(registry.record(0x10).unwrap().error_code, HardwareFault::NONE);

        registry.hardware_mut().faulty.insert(0x10);
        assert!(registry.calibrate(0x10).is_err());
        assert_eq!(
            registry.record(0x10).unwrap().error_code,
            HardwareFault::CALIBRATION_FAILED
        );
        assert!(registry.test(0x10).is_ok());
    }

    #[test]
    fn test_liveness_is_lazy() {
        let mut registry = registry();
        registry.record_update(0x10, 1.5, true, 1000).unwrap();
        assert!(registry.is_responding(0x10, 1000).unwrap());
        assert!(registry.is_responding(0x10, 1500).unwrap());
        assert!(!registry.is_responding(0x10, 1501).unwrap());

        let status = registry.status(0x10, 1200).unwrap();
        assert_eq!(status.value, 1.5);
        assert!(status.responding);
    }

    #[test]
    fn test_emergency_stop_disables_all_enabled() {
        let mut registry = registry();
        registry.enable(0x10).unwrap();
        registry.enable(0x30).unwrap();
        registry.hardware_mut().faulty.insert(0x30);

        // 0x30 没能到达安全输出，不计入停止数，但仍然失能
        assert_eq!(registry.emergency_stop(), 1);
        assert!(registry.records().all(|r| !r.enabled));
        assert_eq!(registry.record(0x30).unwrap().error_code, 0x44);
        assert_eq!(registry.hardware().safe_outputs, vec![0x10, 0x30]);
    }

    #[test]
    fn test_safe_mode_keeps_exempt_components() {
        let mut registry = registry();
        registry.enable(0x10).unwrap();
        registry.enable(0x30).unwrap();

        assert_eq!(registry.enter_safe_mode(), 1);
        assert!(!registry.record(0x10).unwrap().enabled);
        assert!(registry.record(0x30).unwrap().enabled);
    }

    #[test]
    fn test_responding_bitmap_and_poll() {
        let mut registry = registry();
        registry.hardware_mut().readings = vec![(0x10, 2.0), (0x30, 3.0)];
        assert_eq!(registry.poll_components(100), 2);
        assert_eq!(registry.responding_bitmap(100), 0b101);
        assert_eq!(registry.responding_bitmap(700), 0);
        assert_eq!(registry.record(0x30).unwrap().value, 3.0);
    }

    #[test]
    fn test_poll_matches_record_update() {
        let mut polled = registry();
        polled.hardware_mut().readings = vec![(0x10, 4.0)];
        polled.poll_components(250);

        let mut reported = registry();
        reported.record_update(0x10, 4.0, true, 250).unwrap();

        assert_eq!(polled.record(0x10).unwrap(), reported.record(0x10).unwrap());
        // 轮询过的组件超时后算丢失
        assert_eq!(polled.mandatory_liveness_lost(751), Some(0x10));
    }

    #[test]
    fn test_mandatory_checks() {
        let mut registry = registry();
        assert_eq!(registry.check_mandatory(0, false), Err(0x10));
        // 从未上报的组件不算丢失
        assert_eq!(registry.mandatory_liveness_lost(0), None);

        registry.record_update(0x10, 0.0, true, 0).unwrap();
        registry.record_update(0x20, 0.0, true, 0).unwrap();
        assert_eq!(registry.check_mandatory(100, false), Ok(()));
        assert_eq!(registry.check_mandatory(100, true), Err(0x10));

        registry.enable(0x10).unwrap();
        registry.enable(0x20).unwrap();
        assert_eq!(registry.check_mandatory(100, true), Ok(()));

        assert_eq!(registry.mandatory_liveness_lost(600), Some(0x10));
    }

    #[test]
    fn test_reset_component_and_all() {
        let mut registry = registry();
        registry.enable(0x10).unwrap();
        registry.set_state(0x10, 1).unwrap();
        registry.record_update(0x10, 9.0, true, 0).unwrap();

        registry.reset_component(0x10).unwrap();
        let record = registry.record(0x10).unwrap();
        assert_eq!(record.state, COMPONENT_STATE_UNKNOWN);
        assert!(!record.enabled);
        assert!(!registry.is_responding(0x10, 0).unwrap());
        assert_eq!(registry.mandatory_liveness_lost(10_000), None);

        registry.enable(0x20).unwrap();
        assert_eq!(registry.reset_all_components(), 0);
        assert!(registry.records().all(|r| !r.enabled));
    }
}
