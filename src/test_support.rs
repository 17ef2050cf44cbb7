//! Bus polling helpers shared by the manager tests.

use std::{
    thread,
    time::{Duration, Instant},
};

use tokio::sync::broadcast::{error::TryRecvError, Receiver};

use crate::protocol::Message;

pub(crate) fn wait_for_message<F>(
    receiver: &mut Receiver<Message>,
    timeout: Duration,
    mut predicate: F,
) -> Message
where
    F: FnMut(&Message) -> bool,
{
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout {
            panic!("timed out waiting for expected message");
        }
        match receiver.try_recv() {
            Ok(message) => {
                if predicate(&message) {
                    return message;
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => panic!("bus closed while waiting for message"),
        }
    }
}

pub(crate) fn assert_no_message<F>(receiver: &mut Receiver<Message>, timeout: Duration, mut predicate: F)
where
    F: FnMut(&Message) -> bool,
{
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout {
            return;
        }
        match receiver.try_recv() {
            Ok(message) => {
                if predicate(&message) {
                    panic!("received unexpected message: {:?}", message);
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => return,
        }
    }
}

pub(crate) fn drain_messages(receiver: &mut Receiver<Message>) {
    loop {
        match receiver.try_recv() {
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => break,
        }
    }
}
