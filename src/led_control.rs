use crate::matrix::{Frame, NUM_PIXELS};
use crate::{BoardError, println};
use esp_hal::gpio::Level;
use esp_hal::rmt::{PulseCode, TxChannel};

/// RMT pulses for one frame: 24 bits per pixel plus the latch
const FRAME_PULSES: usize = NUM_PIXELS * 24 + 1;

/// WS2812 matrix driver on an RMT channel clocked at 10 MHz
pub struct MatrixDriver<TX>
where
    TX: TxChannel,
{
    channel: Option<TX>,
    last_frame: Frame,
    failures: u32,
}

impl<TX> MatrixDriver<TX>
where
    TX: TxChannel,
{
    pub fn new(channel: TX) -> Self {
        Self {
            channel: Some(channel),
            last_frame: Frame::new(),
            failures: 0,
        }
    }

    /// Last frame handed to [`write`](Self::write)
    pub fn frame(&self) -> &Frame {
        &self.last_frame
    }

    /// Transmits a frame and blocks until the strip latched it
    pub fn write(&mut self, frame: &Frame) -> Result<(), BoardError> {
        let mut pulses = [0u32; FRAME_PULSES];
        for (chunk, byte) in pulses.chunks_exact_mut(8).zip(frame.grb_bytes()) {
            chunk.copy_from_slice(&byte_to_pulses(byte));
        }
        // Reset/latch: >50us low
        pulses[FRAME_PULSES - 1] = PulseCode::new(Level::Low, 500, Level::Low, 0);

        let channel = self.channel.take().ok_or(BoardError::LedError)?;
        match channel.transmit(&pulses) {
            Ok(transaction) => match transaction.wait() {
                Ok(channel) => {
                    self.channel = Some(channel);
                }
                Err((_, channel)) => {
                    // The strip usually latches anyway; keep the channel and count it
                    self.channel = Some(channel);
                    self.failures += 1;
                    if self.failures % 100 == 1 {
                        println!("[LED] RMT transmit reported an error ({} so far)", self.failures);
                    }
                }
            },
            Err(e) => {
                println!("[LED] RMT transmit failed: {:?}", e);
                return Err(BoardError::LedError);
            }
        }

        self.last_frame = frame.clone();
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), BoardError> {
        self.write(&Frame::new())
    }
}

/// WS2812 timing at 10MHz: 1-bit = 800ns high + 400ns low, 0-bit = 400ns high + 800ns low
fn byte_to_pulses(byte: u8) -> [u32; 8] {
    let mut pulses = [0u32; 8];

    for (i, pulse) in pulses.iter_mut().enumerate() {
        *pulse = if (byte >> (7 - i)) & 1 == 1 {
            PulseCode::new(Level::High, 8, Level::Low, 4)
        } else {
            PulseCode::new(Level::High, 4, Level::Low, 8)
        };
    }

    pulses
}
