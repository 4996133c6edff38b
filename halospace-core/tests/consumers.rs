/*
    consumers.rs - Credential consumers across registration and live appends

    A consumer must see every credential of the log exactly once and in log order, no
    matter how registration interleaves with appends from other tasks.
*/

use halospace_core::core_state::{SpaceHandle, SpaceStateMachine};
use halospace_core::test_utils::{RecordingProcessor, TestSpace};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registration_interleaved_with_appends() {
    let space = Arc::new(TestSpace::new());
    let handle = SpaceHandle::new(SpaceStateMachine::new(space.space_key));
    handle.process_all(space.genesis_sequence(), space.control_options()).await.unwrap();

    let writer = {
        let handle = handle.clone();
        let space = space.clone();
        tokio::spawn(async move {
            for _ in 0..40 {
                let credential = space.authorize_new_device();
                assert!(handle.process(credential, space.control_options()).await.unwrap());
                tokio::task::yield_now().await;
            }
        })
    };

    let mut processors = Vec::new();
    for _ in 0..5 {
        let processor = Arc::new(RecordingProcessor::new());
        handle.add_credential_processor(processor.clone()).await;
        processors.push(processor);
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    let log: Vec<_> = handle
        .with_state(|state| state.credentials().iter().map(|entry| entry.credential.id.unwrap()).collect())
        .await;
    assert_eq!(log.len(), 44);

    for processor in processors {
        assert_eq!(processor.wait_for(log.len()).await, log);
    }
}

#[tokio::test]
async fn test_removed_consumer_stops_receiving() {
    let space = TestSpace::new();
    let handle = SpaceHandle::new(space.bootstrapped().await);
    let processor = Arc::new(RecordingProcessor::new());

    let id = handle.add_credential_processor(processor.clone()).await;
    processor.wait_for(4).await;
    handle.remove_credential_processor(id).await.unwrap();

    handle.process(space.authorize_new_device(), space.control_options()).await.unwrap();
    tokio::task::yield_now().await;
    assert_eq!(processor.seen().len(), 4);
}

#[tokio::test]
async fn test_consumers_closed_with_space() {
    let space = TestSpace::new();
    let processor = Arc::new(RecordingProcessor::new());
    {
        let mut machine = space.bootstrapped().await;
        machine.add_credential_processor(processor.clone());
        processor.wait_for(4).await;
    }
    // The aborted consumer task held the only other reference.
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while Arc::strong_count(&processor) > 1 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}
