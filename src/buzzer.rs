//! Piezo buzzer on a PWM channel.
//!
//! The tone frequency comes from the LEDC timer the channel is bound to; this
//! wrapper only switches between a 50 % square wave and silence.

use crate::{BoardError, println};
use embedded_hal::pwm::SetDutyCycle;

pub struct Buzzer<P> {
    pwm: P,
    sounding: bool,
}

impl<P: SetDutyCycle> Buzzer<P> {
    /// Takes the channel and makes sure it starts silent
    pub fn new(mut pwm: P) -> Result<Self, BoardError> {
        pwm.set_duty_cycle_fully_off()
            .map_err(|_| BoardError::PwmError)?;
        Ok(Self {
            pwm,
            sounding: false,
        })
    }

    pub fn start(&mut self) -> Result<(), BoardError> {
        self.pwm
            .set_duty_cycle_percent(50)
            .map_err(|_| BoardError::PwmError)?;
        if !self.sounding {
            println!("[BUZZER] On");
        }
        self.sounding = true;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), BoardError> {
        self.pwm
            .set_duty_cycle_fully_off()
            .map_err(|_| BoardError::PwmError)?;
        if self.sounding {
            println!("[BUZZER] Off");
        }
        self.sounding = false;
        Ok(())
    }

    /// Convenience for the alert loop
    pub fn set(&mut self, on: bool) -> Result<(), BoardError> {
        if on { self.start() } else { self.stop() }
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::pwm::{ErrorType, SetDutyCycle};

    struct FakePwm {
        duty: u16,
    }

    impl ErrorType for FakePwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for FakePwm {
        fn max_duty_cycle(&self) -> u16 {
            1023
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty = duty;
            Ok(())
        }
    }

    #[test]
    fn starts_silent() {
        let buzzer = Buzzer::new(FakePwm { duty: 700 }).unwrap();
        assert!(!buzzer.is_sounding());
        assert_eq!(buzzer.pwm.duty, 0);
    }

    #[test]
    fn start_uses_half_duty() {
        let mut buzzer = Buzzer::new(FakePwm { duty: 0 }).unwrap();
        buzzer.start().unwrap();
        assert!(buzzer.is_sounding());
        assert_eq!(buzzer.pwm.duty, 511);
        buzzer.set(false).unwrap();
        assert_eq!(buzzer.pwm.duty, 0);
        assert!(!buzzer.is_sounding());
    }
}
