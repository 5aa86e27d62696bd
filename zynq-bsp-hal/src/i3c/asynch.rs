//! Asynchronous AXI I3C transfers.
//!
//! The write FIFO is filled up to its configured depth when a write starts. It is refilled on
//! the falling edge of the write FIFO almost-full condition, at which point the space above the
//! programmable threshold is free. The read FIFO is drained when it is almost full, and a
//! transfer completes once its response word arrives. The user has to call [on_interrupt] from the interrupt handler of the controller.
use core::{
    cell::RefCell,
    future::Future,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use critical_section::Mutex;
use embassy_sync::waitqueue::AtomicWaker;
use raw_slice::{RawBufSlice, RawBufSliceMut};
use zynq_bsp::i3c::{CommandType, I3c as I3cRegs, Interrupts, MmioI3c, Reset};

use super::{I3c, I3cError, MAX_TRANSFER_LEN, Transfer, pack_word, response_result};

/// Number of controller instances supported by the interrupt driven driver.
pub const MAX_I3C_INSTANCES: usize = 2;

static WAKERS: [AtomicWaker; MAX_I3C_INSTANCES] =
    [const { AtomicWaker::new() }; MAX_I3C_INSTANCES];
static TRANSFER_CONTEXTS: [Mutex<RefCell<TransferContext>>; MAX_I3C_INSTANCES] =
    [const { Mutex::new(RefCell::new(TransferContext::new())) }; MAX_I3C_INSTANCES];
static DONE: [AtomicBool; MAX_I3C_INSTANCES] =
    [const { AtomicBool::new(false) }; MAX_I3C_INSTANCES];
// Register block base address for each instance, 0 if no async driver was created.
static BASE_ADDRS: [AtomicUsize; MAX_I3C_INSTANCES] =
    [const { AtomicUsize::new(0) }; MAX_I3C_INSTANCES];

#[derive(Debug, thiserror::Error)]
#[error("I3C device ID {0} exceeds the number of supported instances")]
pub struct InvalidI3cInstance(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Read,
    Write,
}

#[derive(Debug, Copy, Clone)]
pub struct TransferContext {
    transfer_type: Option<TransferType>,
    progress: usize,
    /// Number of words written per write FIFO refill interrupt.
    refill_words: usize,
    tx_slice: RawBufSlice,
    rx_slice: RawBufSliceMut,
    result: Option<Result<usize, I3cError>>,
}

#[allow(clippy::new_without_default)]
impl TransferContext {
    pub const fn new() -> Self {
        Self {
            transfer_type: None,
            progress: 0,
            refill_words: 0,
            tx_slice: RawBufSlice::new_nulled(),
            rx_slice: RawBufSliceMut::new_nulled(),
            result: None,
        }
    }
}

fn steal_regs(idx: usize) -> Option<MmioI3c<'static>> {
    let base = BASE_ADDRS[idx].load(Ordering::Relaxed);
    if base == 0 {
        return None;
    }
    Some(unsafe { I3cRegs::new_mmio_at(base) })
}

fn disable_interrupts(regs: &mut MmioI3c<'static>) {
    regs.write_ier_rising(Interrupts::new_with_raw_value(0));
    regs.write_ier_falling(Interrupts::new_with_raw_value(0));
}

/// Write up to `max_words` words into the write FIFO. Returns the new progress.
fn refill_wr_fifo(
    regs: &mut MmioI3c<'static>,
    data: &[u8],
    mut progress: usize,
    max_words: usize,
) -> usize {
    let mut words = 0;
    while words < max_words && progress < data.len() && !regs.read_sr().wr_fifo_full() {
        let len = core::cmp::min(4, data.len() - progress);
        regs.write_wr_fifo(pack_word(&data[progress..progress + len]));
        progress += len;
        words += 1;
    }
    progress
}

/// Interrupt handler for asynchronous transfers of the given controller instance.
///
/// The user has to call this once in the interrupt handler responsible for the controller.
pub fn on_interrupt(instance: usize) {
    if instance >= MAX_I3C_INSTANCES {
        return;
    }
    let Some(mut regs) = steal_regs(instance) else {
        return;
    };
    let isr = regs.read_isr();
    // Write-one-to-clear.
    regs.write_isr(isr);
    let mut context =
        critical_section::with(|cs| *TRANSFER_CONTEXTS[instance].borrow(cs).borrow());
    let Some(transfer_type) = context.transfer_type else {
        return;
    };
    match transfer_type {
        TransferType::Write => {
            let data = unsafe { context.tx_slice.get() }.unwrap_or(&[]);
            context.progress =
                refill_wr_fifo(&mut regs, data, context.progress, context.refill_words);
        }
        TransferType::Read => {
            if let Some(buf) = unsafe { context.rx_slice.get_mut() } {
                I3c::drain_rd_fifo(&mut regs, buf, &mut context.progress);
            }
        }
    }
    if !regs.read_sr().resp_fifo_empty() {
        if transfer_type == TransferType::Read {
            if let Some(buf) = unsafe { context.rx_slice.get_mut() } {
                I3c::drain_rd_fifo(&mut regs, buf, &mut context.progress);
            }
        }
        let resp = regs.read_resp_fifo();
        context.result = Some(response_result(resp).map(|_| context.progress));
        disable_interrupts(&mut regs);
        critical_section::with(|cs| {
            *TRANSFER_CONTEXTS[instance].borrow(cs).borrow_mut() = context;
        });
        DONE[instance].store(true, Ordering::Relaxed);
        WAKERS[instance].wake();
        return;
    }
    critical_section::with(|cs| {
        *TRANSFER_CONTEXTS[instance].borrow(cs).borrow_mut() = context;
    });
}

pub struct I3cFuture {
    instance: usize,
    finished_regularly: core::cell::Cell<bool>,
}

impl I3cFuture {
    fn new_for_write(i3c: &mut I3c, instance: usize, target: u8, data: &[u8]) -> Self {
        DONE[instance].store(false, Ordering::Relaxed);
        disable_interrupts(i3c.regs());
        let config = i3c.config();
        let fifo_depth = config.rw_fifo_depth as usize;
        let refill_words =
            core::cmp::max(fifo_depth.saturating_sub(config.wr_threshold as usize), 1);
        let progress = refill_wr_fifo(i3c.regs(), data, 0, fifo_depth);
        critical_section::with(|cs| {
            let mut context = TRANSFER_CONTEXTS[instance].borrow(cs).borrow_mut();
            context.transfer_type = Some(TransferType::Write);
            unsafe {
                context.tx_slice.set(data);
            }
            context.rx_slice.set_null();
            context.progress = progress;
            context.refill_words = refill_words;
            context.result = None;
        });
        let cmd = i3c.command(&Transfer {
            cmd_type: CommandType::I3cSdr,
            target_addr: target,
            len: data.len(),
            read: false,
            stop: true,
        });
        let regs = i3c.regs();
        regs.write_isr(Interrupts::ALL);
        regs.write_ier_rising(Interrupts::new_with_raw_value(0).with_resp_not_empty(true));
        if progress < data.len() {
            regs.write_ier_falling(
                Interrupts::new_with_raw_value(0).with_wr_fifo_almost_full(true),
            );
        }
        regs.write_cmd_fifo(cmd);
        Self {
            instance,
            finished_regularly: core::cell::Cell::new(false),
        }
    }

    fn new_for_read(i3c: &mut I3c, instance: usize, target: u8, buf: &mut [u8]) -> Self {
        DONE[instance].store(false, Ordering::Relaxed);
        disable_interrupts(i3c.regs());
        critical_section::with(|cs| {
            let mut context = TRANSFER_CONTEXTS[instance].borrow(cs).borrow_mut();
            context.transfer_type = Some(TransferType::Read);
            unsafe {
                context.rx_slice.set(buf);
            }
            context.tx_slice.set_null();
            context.progress = 0;
            context.refill_words = 0;
            context.result = None;
        });
        let cmd = i3c.command(&Transfer {
            cmd_type: CommandType::I3cSdr,
            target_addr: target,
            len: buf.len(),
            read: true,
            stop: true,
        });
        let regs = i3c.regs();
        regs.write_isr(Interrupts::ALL);
        regs.write_ier_rising(
            Interrupts::new_with_raw_value(0)
                .with_resp_not_empty(true)
                .with_rd_fifo_almost_full(true),
        );
        regs.write_cmd_fifo(cmd);
        Self {
            instance,
            finished_regularly: core::cell::Cell::new(false),
        }
    }
}

impl Future for I3cFuture {
    type Output = Result<usize, I3cError>;

    fn poll(
        self: core::pin::Pin<&mut Self>,
        cx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Self::Output> {
        WAKERS[self.instance].register(cx.waker());
        if DONE[self.instance].swap(false, Ordering::Relaxed) {
            let result = critical_section::with(|cs| {
                let mut ctx = TRANSFER_CONTEXTS[self.instance].borrow(cs).borrow_mut();
                let result = ctx.result.unwrap_or(Err(I3cError::Aborted));
                *ctx = TransferContext::new();
                result
            });
            self.finished_regularly.set(true);
            return core::task::Poll::Ready(result);
        }
        core::task::Poll::Pending
    }
}

impl Drop for I3cFuture {
    fn drop(&mut self) {
        if !self.finished_regularly.get() {
            if let Some(mut regs) = steal_regs(self.instance) {
                disable_interrupts(&mut regs);
                regs.modify_cr(|mut cr| {
                    cr.set_abort(true);
                    cr
                });
                regs.write_reset(Reset::ALL_FIFOS);
                regs.write_reset(Reset::new_with_raw_value(0));
                regs.modify_cr(|mut cr| {
                    cr.set_abort(false);
                    cr
                });
            }
            critical_section::with(|cs| {
                *TRANSFER_CONTEXTS[self.instance].borrow(cs).borrow_mut() = TransferContext::new();
            });
        }
    }
}

/// Asynchronous AXI I3C driver for private SDR transfers.
pub struct I3cAsync {
    i3c: I3c,
    instance: usize,
}

impl I3cAsync {
    /// The configuration device ID is used as the instance index passed to [on_interrupt].
    pub fn new(i3c: I3c) -> Result<Self, InvalidI3cInstance> {
        let instance = i3c.config().device_id as usize;
        if instance >= MAX_I3C_INSTANCES {
            return Err(InvalidI3cInstance(i3c.config().device_id));
        }
        let mut i3c = i3c;
        let base = unsafe { i3c.regs().ptr() } as usize;
        BASE_ADDRS[instance].store(base, Ordering::Relaxed);
        Ok(Self { i3c, instance })
    }

    pub fn release(self) -> I3c {
        BASE_ADDRS[self.instance].store(0, Ordering::Relaxed);
        self.i3c
    }

    #[inline]
    pub fn inner(&mut self) -> &mut I3c {
        &mut self.i3c
    }

    pub async fn write(&mut self, target: u8, data: &[u8]) -> Result<(), I3cError> {
        if data.len() > MAX_TRANSFER_LEN {
            return Err(I3cError::TransferTooLarge);
        }
        super::check_target_address(target)?;
        I3cFuture::new_for_write(&mut self.i3c, self.instance, target, data)
            .await
            .map(|_| ())
    }

    /// Returns the number of received bytes.
    pub async fn read(&mut self, target: u8, buf: &mut [u8]) -> Result<usize, I3cError> {
        if buf.len() > MAX_TRANSFER_LEN {
            return Err(I3cError::TransferTooLarge);
        }
        super::check_target_address(target)?;
        I3cFuture::new_for_read(&mut self.i3c, self.instance, target, buf).await
    }
}
