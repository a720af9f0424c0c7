//! TIM3/TIM4 (encoders), TIM8 (motors) and TIM11 (speaker), RM0090 §17–19.
//!
//! All four are driven through the general-purpose register view; TIM8's
//! RCR and BDTR go through its advanced-control view. Registers a timer lacks
//! (CCR2..4 on TIM11) are never written for it.

use embassy_stm32::pac::timer::vals::{CcmrInputCcs, Cms, Dir, Ocm, Sms};
use embassy_stm32::pac::timer::{TimAdv, TimGp16};
use platform::timer::{Channel, EncoderTimer, PwmTimer, TimerId};

/// A timer driven as a PWM source.
pub struct HardwareTimer {
    pub(crate) regs: TimGp16,
    /// Advanced-control view, present on TIM8 only.
    pub(crate) advanced: Option<TimAdv>,
    pub(crate) id: TimerId,
}

impl HardwareTimer {
    fn owns(&self, channel: Channel) -> bool {
        channel.index() < self.id.channel_count()
    }
}

impl PwmTimer for HardwareTimer {
    fn set_edge_aligned_up(&mut self) {
        self.regs.cr1().modify(|w| {
            w.set_dir(Dir::UP);
            w.set_cms(Cms::EDGEALIGNED);
        });
    }

    fn set_prescaler(&mut self, prescaler: u16) {
        self.regs.psc().write(|w| w.set_psc(prescaler));
    }

    fn set_auto_reload(&mut self, auto_reload: u16) {
        self.regs.arr().write(|w| w.set_arr(auto_reload));
    }

    fn set_repetition_counter(&mut self, value: u8) {
        if let Some(advanced) = self.advanced {
            advanced.rcr().write(|w| w.set_rep(value));
        }
    }

    fn enable_auto_reload_preload(&mut self) {
        self.regs.cr1().modify(|w| w.set_arpe(true));
    }

    fn set_continuous(&mut self) {
        self.regs.cr1().modify(|w| w.set_opm(false));
    }

    fn set_pwm_mode1(&mut self, channel: Channel) {
        if !self.owns(channel) {
            return;
        }
        let n = channel.index();
        let (ccmr, slot) = (n.wrapping_div(2), n.wrapping_rem(2));
        self.regs.ccmr_output(ccmr).modify(|w| {
            w.set_ocm(slot, Ocm::PWMMODE1);
            w.set_ocpe(slot, true);
        });
    }

    fn set_compare(&mut self, channel: Channel, value: u16) {
        if self.owns(channel) {
            self.regs.ccr(channel.index()).modify(|w| w.set_ccr(value));
        }
    }

    fn enable_output(&mut self, channel: Channel) {
        if self.owns(channel) {
            self.regs.ccer().modify(|w| w.set_cce(channel.index(), true));
        }
    }

    fn disable_output(&mut self, channel: Channel) {
        if self.owns(channel) {
            self.regs.ccer().modify(|w| w.set_cce(channel.index(), false));
        }
    }

    fn enable_main_output(&mut self) {
        if let Some(advanced) = self.advanced {
            advanced.bdtr().modify(|w| w.set_moe(true));
        }
    }

    fn generate_update(&mut self) {
        self.regs.egr().write(|w| w.set_ug(true));
    }

    fn enable_counter(&mut self) {
        self.regs.cr1().modify(|w| w.set_cen(true));
    }

    fn disable_counter(&mut self) {
        self.regs.cr1().modify(|w| w.set_cen(false));
    }
}

/// A timer counting quadrature edges on CH1/CH2.
pub struct HardwareEncoder {
    pub(crate) regs: TimGp16,
}

impl EncoderTimer for HardwareEncoder {
    fn configure_quadrature(&mut self) {
        self.regs.cr1().modify(|w| w.set_cen(false));
        self.regs.arr().write(|w| w.set_arr(u16::MAX));
        self.regs.smcr().modify(|w| w.set_sms(Sms::ENCODER_MODE_3));
        // TI1 on CC1, TI2 on CC2.
        self.regs.ccmr_input(0).modify(|w| {
            w.set_ccs(0, CcmrInputCcs::TI4);
            w.set_ccs(1, CcmrInputCcs::TI4);
        });
        self.regs.ccer().modify(|w| {
            w.set_ccp(0, false);
            w.set_ccp(1, false);
        });
        self.regs.cnt().write(|w| w.set_cnt(0));
        self.regs.cr1().modify(|w| w.set_cen(true));
    }

    fn count(&self) -> u16 {
        self.regs.cnt().read().cnt()
    }
}
