//! Steady-state bridge: decode, map, deliver.
//!
//! After calibration the controller streams `DOWN`/`UP` point frames. The
//! loop maps each one through the shared mapper and hands it to the host
//! input sink, a callback receiving the frame name and the mapped sample.
//! Log frames go to the logger, malformed frames are skipped, and the loop
//! says goodbye with `<STOP>` when the caller signals it to wind down.

use embassy_futures::select::{select, Either};
use embedded_io_async::{Read, Write};
use log::{debug, info, warn};

use crate::error::{ChannelError, ReadError};
use crate::mapping::{HostSample, SharedMapper};
use crate::protocol::{FrameReader, HostCommand, Message, RawSample};
use crate::session::StopSignal;

/// Runs the decode-map-deliver loop over a serial channel.
pub struct TouchEventLoop<'a, R> {
    reader: FrameReader<R>,
    mapper: &'a SharedMapper,
    stop: &'a StopSignal,
}

impl<'a, R: Read + Write> TouchEventLoop<'a, R> {
    pub fn new(channel: R, mapper: &'a SharedMapper, stop: &'a StopSignal) -> Self {
        Self {
            reader: FrameReader::new(channel),
            mapper,
            stop,
        }
    }

    /// Hands the channel back, e.g. to start a calibration session on the
    /// same connection.
    pub fn release(self) -> R {
        self.reader.release()
    }

    /// Arms the controller with `START` and pumps events into `deliver`
    /// until the stop signal fires or the channel dies. A cooperative stop
    /// sends the `STOP` farewell so the controller quits reporting.
    ///
    /// `deliver` gets the frame name (`DOWN`, `UP`, ...) and the mapped
    /// sample. Coordinate-less command frames are delivered too, mapped
    /// from the zero sample, so the sink sees device-side events like a
    /// bare `UP` in order with the points around them.
    pub async fn run<D>(&mut self, deliver: &mut D) -> Result<(), ChannelError>
    where
        D: FnMut(&str, HostSample),
    {
        self.reader.send(HostCommand::Start).await?;
        info!("touch event loop started");

        loop {
            match select(self.reader.next_message(), self.stop.wait()).await {
                Either::Second(()) => {
                    self.reader.send(HostCommand::Stop).await?;
                    info!("touch event loop stopped");
                    return Ok(());
                }
                Either::First(Ok(Message::Point { name, sample })) => {
                    deliver(name.as_str(), self.mapper.map(sample));
                }
                Either::First(Ok(Message::Command { name, .. })) => {
                    deliver(name.as_str(), self.mapper.map(RawSample::default()));
                }
                Either::First(Ok(Message::Log { text })) => {
                    info!("device: {}", text);
                }
                Either::First(Err(ReadError::Decode(e))) => {
                    warn!("skipping malformed frame: {}", e);
                }
                Either::First(Err(ReadError::Channel(e))) => {
                    debug!("channel closed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
