//! Start another DMA channel
//!
//! A master queue can start a slave channel on a queue of its own. The
//! master's nodes suspend and reset the slave channel, point it at the
//! slave queue, and enable it. The two queues share nothing else: the
//! master only carries the slave queue's head address.
//!
//! Attach a trigger to the `Suspend` node to decide when the master
//! switches the slave to this queue.

use crate::{
    channel::{Channel, Configuration},
    node::{NodeKind, NodeTag, Step},
    ral::lpdma::ch::{offsets, CCR, CLBAR, CLLR, CLLR_UPDATE_ALL},
    Descriptor, Error, NodePool, Placement, Queue, Result,
};

/// Run a slave channel on a slave queue
///
/// The values are captured when you create the configuration. Build the
/// slave queue completely, triggers and loops included, before creating
/// the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartConfig {
    /// Bus address of the slave channel's registers
    channel: u32,
    clbar: u32,
    cllr: u32,
    ccr: u32,
}

impl StartConfig {
    /// Start `channel` on `queue`, using `configuration`
    ///
    /// The slave queue must be valid, and it must not be linked to a
    /// channel. On success, `queue` belongs to the slave channel for good:
    /// no channel can link it, and it accepts no more nodes. Several
    /// configurations may share a slave channel, but not a queue.
    pub fn new<const N: usize>(
        channel: &Channel,
        pool: &NodePool<N>,
        queue: &mut Queue,
        configuration: &Configuration,
    ) -> Result<Self> {
        if queue.channel().is_some() {
            return Err(Error::QueueBusy);
        }
        queue.validate(pool)?;
        let head = queue.head().ok_or(Error::EmptyQueue)?;
        queue.claim(channel.index())?;
        Ok(StartConfig {
            channel: channel.address(),
            clbar: pool.address() & CLBAR::LBA::mask,
            cllr: CLLR_UPDATE_ALL | (pool.node_address(head) & CLLR::LA::mask),
            ccr: configuration.ccr(),
        })
    }
}

/// Suspend and reset the slave channel, then start it on the slave queue
///
/// Appends `Suspend`, `Stop`, `Config`, `Link` and `Start` nodes. The
/// slave suspends before the `Stop` node resets it.
pub fn start<const N: usize>(
    pool: &mut NodePool<N>,
    queue: &mut Queue,
    placement: Placement,
    config: &StartConfig,
) -> Result<Descriptor> {
    let channel = config.channel;
    queue.append(
        pool,
        placement,
        NodeKind::DmaStart,
        &[
            Step::write(NodeTag::Suspend, channel + offsets::CCR, CCR::SUSP::mask),
            Step::write(NodeTag::Stop, channel + offsets::CCR, CCR::RESET::mask),
            Step::write(NodeTag::Config, channel + offsets::CLBAR, config.clbar),
            Step::write(NodeTag::Link, channel + offsets::CLLR, config.cllr),
            Step::write(
                NodeTag::Start,
                channel + offsets::CCR,
                config.ccr | CCR::EN::mask,
            ),
        ],
    )
}
