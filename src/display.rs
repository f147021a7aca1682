//! SSD1306 128x64 status screen over I2C

use crate::BoardError;
use crate::alert::AlertSnapshot;
use crate::state_machine::LinkState;
use core::fmt::Write;
use embedded_graphics::mono_font::{MonoTextStyle, ascii::FONT_6X10};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use heapless::String;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

pub const MAX_LINES: usize = 4;
pub const LINE_CHARS: usize = 21;

const LEFT_MARGIN: i32 = 5;
const LINE_SPACING: i32 = 16;

pub type ScreenLine = String<LINE_CHARS>;

/// Lines of the alert station screen
pub fn alert_screen(celsius: f32, alert: &AlertSnapshot, link: LinkState) -> [ScreenLine; MAX_LINES] {
    let mut lines: [ScreenLine; MAX_LINES] = Default::default();
    let _ = write!(lines[0], "Temp: {:.2} C", celsius);
    let _ = write!(lines[1], "Alerts: {}", alert.count);
    let _ = write!(lines[2], "Limit: {:.1} C", alert.threshold);
    let _ = write!(lines[3], "Link: {}", link.label());
    lines
}

pub struct StatusDisplay<I2C> {
    display: Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>,
}

impl<I2C> StatusDisplay<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    pub fn new(i2c: I2C) -> Result<Self, BoardError> {
        let interface = I2CDisplayInterface::new(i2c);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        display.init().map_err(|_| BoardError::DisplayError)?;
        Ok(Self { display })
    }

    /// Clears the screen and draws up to four text lines
    pub fn show_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<(), BoardError> {
        self.display.clear_buffer();
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

        for (row, line) in lines.iter().take(MAX_LINES).enumerate() {
            Text::with_baseline(
                line.as_ref(),
                Point::new(LEFT_MARGIN, LEFT_MARGIN + row as i32 * LINE_SPACING),
                style,
                Baseline::Top,
            )
            .draw(&mut self.display)
            .map_err(|_| BoardError::DisplayError)?;
        }

        self.display.flush().map_err(|_| BoardError::DisplayError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

    struct FakeI2c<'a> {
        transactions: &'a Cell<usize>,
        address: &'a Cell<u8>,
    }

    impl ErrorType for FakeI2c<'_> {
        type Error = Infallible;
    }

    impl I2c<SevenBitAddress> for FakeI2c<'_> {
        fn transaction(
            &mut self,
            address: SevenBitAddress,
            _operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            self.address.set(address);
            self.transactions.set(self.transactions.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn alert_screen_lines() {
        let snap = AlertSnapshot {
            threshold: 30.0,
            active: true,
            count: 2,
        };
        let lines = alert_screen(31.456, &snap, LinkState::Connected);
        assert_eq!(lines[0].as_str(), "Temp: 31.46 C");
        assert_eq!(lines[1].as_str(), "Alerts: 2");
        assert_eq!(lines[2].as_str(), "Limit: 30.0 C");
        assert_eq!(lines[3].as_str(), "Link: online");
    }

    #[test]
    fn lines_fit_the_screen_width() {
        let snap = AlertSnapshot {
            threshold: -40.0,
            active: false,
            count: u32::MAX,
        };
        let lines = alert_screen(-40.0, &snap, LinkState::Connecting);
        assert_eq!(lines[0].as_str(), "Temp: -40.00 C");
        assert_eq!(lines[1].as_str(), "Alerts: 4294967295");
        assert_eq!(lines[2].as_str(), "Limit: -40.0 C");
        assert_eq!(lines[3].as_str(), "Link: connecting");
        assert!(lines.iter().all(|l| l.len() <= LINE_CHARS));
    }

    #[test]
    fn draws_through_the_i2c_bus() {
        let transactions = Cell::new(0);
        let address = Cell::new(0);
        let mut display = StatusDisplay::new(FakeI2c {
            transactions: &transactions,
            address: &address,
        })
        .unwrap();
        let after_init = transactions.get();
        assert!(after_init > 0);

        display.show_lines(&["Temp: 25.00 C", "Alerts: 0"]).unwrap();
        assert!(transactions.get() > after_init);
        assert_eq!(address.get(), 0x3C);
    }
}
