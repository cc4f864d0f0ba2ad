//! 组件硬件抽象
//!
//! 组件表只通过 `HardwareDriver` 接触硬件。除 `probe` 外都有默认实现，
//! 只有被动组件（没有输出 / 不支持校准）的后端可以省略对应方法。

use crate::config::ComponentKind;
use hat_protocol::ComponentConfig;

/// 硬件故障码（写入组件记录的 `error_code`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareFault(pub u8);

impl HardwareFault {
    /// 无故障
    pub const NONE: u8 = 0x00;
    /// 校准失败
    pub const CALIBRATION_FAILED: u8 = 0xC0;
    /// 自检失败
    pub const SELF_TEST_FAILED: u8 = 0xC1;

    pub fn code(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hardware fault 0x{:02X}", self.0)
    }
}

/// 组件硬件访问接口
pub trait HardwareDriver {
    /// 探测组件是否存在
    fn probe(&mut self, address: u16, kind: ComponentKind) -> bool;

    /// 应用组件状态
    fn apply_state(&mut self, _address: u16, _state: u8) -> Result<(), HardwareFault> {
        Ok(())
    }

    /// 清除组件相关输出（失能时调用）
    fn clear_outputs(&mut self, _address: u16) -> Result<(), HardwareFault> {
        Ok(())
    }

    fn apply_config(
        &mut self,
        _address: u16,
        _config: &ComponentConfig,
    ) -> Result<(), HardwareFault> {
        Ok(())
    }

    fn calibrate(&mut self, _address: u16) -> Result<(), HardwareFault> {
        Ok(())
    }

    fn self_test(&mut self, _address: u16) -> Result<(), HardwareFault> {
        Ok(())
    }

    /// 强制安全输出（急停 / 安全模式）
    fn force_safe_output(&mut self, _address: u16) -> Result<(), HardwareFault> {
        Ok(())
    }

    fn reset(&mut self, _address: u16) -> Result<(), HardwareFault> {
        Ok(())
    }

    /// 读取一次测量值；`None` 表示本周期无新数据
    fn poll(&mut self, _address: u16) -> Option<f32> {
        None
    }
}

impl<H: HardwareDriver + ?Sized> HardwareDriver for Box<H> {
    fn probe(&mut self, address: u16, kind: ComponentKind) -> bool {
        (**self).probe(address, kind)
    }

    fn apply_state(&mut self, address: u16, state: u8) -> Result<(), HardwareFault> {
        (**self).apply_state(address, state)
    }

    fn clear_outputs(&mut self, address: u16) -> Result<(), HardwareFault> {
        (**self).clear_outputs(address)
    }

    fn apply_config(
        &mut self,
        address: u16,
        config: &ComponentConfig,
    ) -> Result<(), HardwareFault> {
        (**self).apply_config(address, config)
    }

    fn calibrate(&mut self, address: u16) -> Result<(), HardwareFault> {
        (**self).calibrate(address)
    }

    fn self_test(&mut self, address: u16) -> Result<(), HardwareFault> {
        (**self).self_test(address)
    }

    fn force_safe_output(&mut self, address: u16) -> Result<(), HardwareFault> {
        (**self).force_safe_output(address)
    }

    fn reset(&mut self, address: u16) -> Result<(), HardwareFault> {
        (**self).reset(address)
    }

    fn poll(&mut self, address: u16) -> Option<f32> {
        (**self).poll(address)
    }
}
