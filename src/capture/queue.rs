use std::sync::mpsc;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::surface::{ContentSignature, VisualState};

/// One grid slot to encode, handed from the sampler to the encoder exactly once.
#[derive(Clone, Debug)]
pub struct CaptureJob {
    pub index: FrameIndex,
    pub state: VisualState,
    pub signature: ContentSignature,
}

impl CaptureJob {
    pub fn new(index: FrameIndex, state: VisualState) -> Self {
        let signature = state.signature();
        Self {
            index,
            state,
            signature,
        }
    }
}

/// Unbounded FIFO between the real-time sampler and the encoder.
///
/// Pushing never blocks. Dropping (or [`FrameQueueTx::finish`]ing) the sender is the
/// "capture finished" signal; the receiver drains what is left and then ends.
pub fn frame_queue() -> (FrameQueueTx, FrameQueueRx) {
    let (tx, rx) = mpsc::channel();
    (
        FrameQueueTx {
            tx,
            last: None,
            pushed: 0,
        },
        FrameQueueRx { rx },
    )
}

#[derive(Debug)]
pub struct FrameQueueTx {
    tx: mpsc::Sender<CaptureJob>,
    last: Option<FrameIndex>,
    pushed: u64,
}

impl FrameQueueTx {
    /// Enqueue a job. Indices must strictly increase.
    pub fn push(&mut self, job: CaptureJob) -> ReelResult<()> {
        if let Some(last) = self.last
            && job.index <= last
        {
            return Err(ReelError::validation(format!(
                "capture job {} enqueued after {}",
                job.index.0, last.0
            )));
        }
        let index = job.index;
        self.tx
            .send(job)
            .map_err(|_| ReelError::encoder("frame encoder stopped before capture finished"))?;
        self.last = Some(index);
        self.pushed += 1;
        Ok(())
    }

    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Signal that no more jobs will arrive.
    pub fn finish(self) {
        tracing::debug!(jobs = self.pushed, "capture finished");
    }
}

#[derive(Debug)]
pub struct FrameQueueRx {
    rx: mpsc::Receiver<CaptureJob>,
}

impl FrameQueueRx {
    /// Next job in FIFO order; blocks until one is available. `None` once the producer has
    /// finished and the queue is drained.
    pub fn next_job(&self) -> Option<CaptureJob> {
        self.rx.recv().ok()
    }
}

impl Iterator for FrameQueueRx {
    type Item = CaptureJob;

    fn next(&mut self) -> Option<CaptureJob> {
        self.next_job()
    }
}
