use no_std_net::SocketAddr;
use tinyvec::ArrayVec;

use coap_msg::Block2;

use crate::fs::{File, FileSystem};

/// Largest block size any SZX can select (SZX=6, 1024 bytes) - the fixed
/// capacity of every block buffer, regardless of the SZX actually in use
/// (spec section 9: "SZX clamped to 6").
pub const BLOCK_SIZE: usize = 1024;

/// Per-file-transfer-in-progress sender state (spec section 3).
///
/// Invariant: at most one block outstanding at a time - `waiting_for_ack`
/// is set exactly between emitting block N and receiving its ACK (spec
/// section 3/4.5).
pub struct BlockSendState<F: File> {
  file: F,
  total_size: u64,
  block_num: u32,
  waiting_for_ack: bool,
  is_image: bool,
  subscriber: SocketAddr,
  szx: u8,
}

impl<F: File> BlockSendState<F> {
  fn block_size(&self) -> usize {
    Block2::new(0, false, self.szx).size()
  }

  fn total_blocks(&self) -> u32 {
    let block_size = self.block_size();
    ((self.total_size as usize + block_size - 1) / block_size).max(1) as u32
  }

  fn more(&self) -> bool {
    self.block_num + 1 < self.total_blocks()
  }
}

/// Drives one file out to one subscriber in fixed-size Block2 blocks (spec
/// section 4.5). A single outstanding transfer; starting a new one while
/// `waiting_for_ack` is set is rejected by the caller observing
/// `transfer_active()` (spec section 5).
pub struct BlockTransferSender<F: File> {
  state: Option<BlockSendState<F>>,
  szx: u8,
}

/// One block ready to be sent as a CON notification.
pub struct OutgoingBlock {
  pub subscriber: SocketAddr,
  pub block2: Block2,
  pub payload: ArrayVec<[u8; BLOCK_SIZE]>,
  /// Content-Format is only present on block 0 (spec section 4.5/9).
  pub content_format: Option<u16>,
}

impl<F: File> BlockTransferSender<F> {
  /// `szx` is the Block2 size exponent to use for every block of every
  /// transfer this sender drives (`Config::block_size_szx`, clamped by the
  /// caller to [`Block2::MAX_SZX`]).
  pub fn new(szx: u8) -> Self {
    Self { state: None, szx }
  }

  pub fn transfer_active(&self) -> bool {
    self.state.is_some()
  }

  /// Open `file` and emit its first block to `subscriber`.
  pub fn begin(&mut self, subscriber: SocketAddr, mut file: F, is_image: bool) -> Result<OutgoingBlock, F::Error> {
    let total_size = file.size()?;
    let mut state =
      BlockSendState { file, total_size, block_num: 0, waiting_for_ack: true, is_image, subscriber, szx: self.szx };
    let block = Self::read_block(&mut state)?;
    self.state = Some(state);
    Ok(block)
  }

  fn read_block(state: &mut BlockSendState<F>) -> Result<OutgoingBlock, F::Error> {
    let block_size = state.block_size();
    let mut payload = ArrayVec::new();
    payload.set_len(BLOCK_SIZE);
    let offset = state.block_num as u64 * block_size as u64;
    let n = state.file.read_at(offset, &mut payload[..block_size])?;
    payload.truncate(n);

    let content_format = if state.block_num == 0 {
      Some(if state.is_image { 22 } else { 0 })
    } else {
      None
    };

    Ok(OutgoingBlock { subscriber: state.subscriber,
                        block2: Block2::new(state.block_num, state.more(), state.szx),
                        payload,
                        content_format })
  }

  /// Advance past the outstanding block on ACK, returning the next block
  /// to send, or `None` if the transfer just completed.
  pub fn on_ack(&mut self) -> Result<Option<OutgoingBlock>, F::Error> {
    let Some(state) = self.state.as_mut() else { return Ok(None) };
    if !state.more() {
      self.state = None;
      return Ok(None);
    }
    state.block_num += 1;
    state.waiting_for_ack = true;
    let block = Self::read_block(state)?;
    Ok(Some(block))
  }

  /// Abort the transfer (e.g. retransmission exhausted for the
  /// outstanding block - spec section 4.5).
  pub fn abort(&mut self) {
    self.state = None;
  }
}

/// Per-file-receive-in-progress state (spec section 3).
pub struct BlockRecvState<F: File> {
  file: F,
  expected_block: u32,
  block_size: usize,
  total_bytes: u64,
  content_format: Option<u16>,
}

/// Consumes incoming Block2 blocks into a file (spec section 4.6).
pub struct BlockTransferReceiver<F: File> {
  state: Option<BlockRecvState<F>>,
}

impl<F: File> Default for BlockTransferReceiver<F> {
  fn default() -> Self {
    Self { state: None }
  }
}

/// What the receiver decided to do with an incoming block.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvOutcome {
  /// Block accepted and written; ACK with this Block2 echoed back.
  Accepted { block2: Block2, complete: bool },
  /// Already-received block; re-ACK without rewriting.
  Duplicate { block2: Block2 },
  /// A block arrived out of order ahead of what's expected; dropped
  /// silently, no ACK (sender will retransmit).
  Gap,
}

impl<F: File> BlockTransferReceiver<F> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Handle one incoming Block2-tagged payload, opening `make_file()` if
  /// this is block 0 of a new transfer.
  pub fn on_block(&mut self,
                   block2: Block2,
                   content_format: Option<u16>,
                   payload: &[u8],
                   make_file: impl FnOnce() -> Result<F, F::Error>)
                   -> Result<RecvOutcome, F::Error> {
    let num = block2.num();

    if num == 0 && self.state.is_none() {
      let mut file = make_file()?;
      file.truncate()?;
      self.state = Some(BlockRecvState { file,
                                          expected_block: 0,
                                          block_size: block2.size(),
                                          total_bytes: 0,
                                          content_format });
    }

    let Some(state) = self.state.as_mut() else {
      return Ok(RecvOutcome::Gap);
    };

    if num < state.expected_block {
      return Ok(RecvOutcome::Duplicate { block2 });
    }
    if num > state.expected_block {
      return Ok(RecvOutcome::Gap);
    }

    state.block_size = block2.size();
    state.file.append(payload)?;
    state.total_bytes += payload.len() as u64;
    state.expected_block += 1;

    let complete = !block2.more();
    if complete {
      self.state = None;
    }

    Ok(RecvOutcome::Accepted { block2, complete })
  }
}

#[cfg(test)]
mod tests {
  use no_std_net::{IpAddr, Ipv4Addr};

  use super::*;
  use crate::fs::test::{InMemoryFile, InMemoryFs};

  const SZX: u8 = 6;

  fn addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)).into(), 5683)
  }

  #[test]
  fn sends_three_blocks_for_2500_byte_file() {
    let fs = InMemoryFs::with_file("text", &vec![b'x'; 2500]);
    let file = fs.open("text").unwrap();

    let mut sender: BlockTransferSender<InMemoryFile> = BlockTransferSender::new(SZX);
    let b0 = sender.begin(addr(), file, false).unwrap();
    assert_eq!(b0.block2.num(), 0);
    assert!(b0.block2.more());
    assert_eq!(b0.payload.len(), 1024);
    assert_eq!(b0.content_format, Some(0));

    let b1 = sender.on_ack().unwrap().unwrap();
    assert_eq!(b1.block2.num(), 1);
    assert!(b1.block2.more());
    assert_eq!(b1.payload.len(), 1024);
    assert_eq!(b1.content_format, None);

    let b2 = sender.on_ack().unwrap().unwrap();
    assert_eq!(b2.block2.num(), 2);
    assert!(!b2.block2.more());
    assert_eq!(b2.payload.len(), 452);

    assert!(sender.on_ack().unwrap().is_none());
    assert!(!sender.transfer_active());
  }

  #[test]
  fn receiver_writes_blocks_in_order() {
    let fs = InMemoryFs::new();
    let mut recv: BlockTransferReceiver<InMemoryFile> = BlockTransferReceiver::new();

    let b0 = Block2::new(0, true, SZX);
    let outcome = recv.on_block(b0, Some(0), &vec![b'a'; 1024], || fs.create("out")).unwrap();
    assert_eq!(outcome, RecvOutcome::Accepted { block2: b0, complete: false });

    let b1 = Block2::new(1, false, SZX);
    let outcome = recv.on_block(b1, None, &vec![b'b'; 452], || unreachable!()).unwrap();
    assert_eq!(outcome, RecvOutcome::Accepted { block2: b1, complete: true });

    let mut file = fs.open("out").unwrap();
    assert_eq!(file.size().unwrap(), 1476);
    let mut buf = [0u8; 4];
    file.read_at(1024, &mut buf).unwrap();
    assert_eq!(&buf, b"bbbb");
  }

  #[test]
  fn receiver_drops_gap_and_reacks_duplicate() {
    let fs = InMemoryFs::new();
    let mut recv: BlockTransferReceiver<InMemoryFile> = BlockTransferReceiver::new();

    let b0 = Block2::new(0, true, SZX);
    recv.on_block(b0, Some(0), &vec![b'a'; 1024], || fs.create("out")).unwrap();

    // Gap: block 2 arrives before block 1.
    let b2 = Block2::new(2, false, SZX);
    let outcome = recv.on_block(b2, None, &[1, 2, 3], || unreachable!()).unwrap();
    assert_eq!(outcome, RecvOutcome::Gap);

    // Duplicate: block 0 arrives again.
    let outcome = recv.on_block(b0, Some(0), &vec![b'z'; 1024], || unreachable!()).unwrap();
    assert_eq!(outcome, RecvOutcome::Duplicate { block2: b0 });
  }
}
