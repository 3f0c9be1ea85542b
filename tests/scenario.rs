mod common;

use std::time::Duration;

use council_paxos::{DeliveryProfile, Message, Phase, ProposalNumber};

use crate::common::{council, decisions, settle, Instant};

#[tokio::test(start_paused = true)]
async fn three_members_decide_on_leader_m1() {
    let (network, engines) = council(3, Duration::from_secs(3), |_| DeliveryProfile::Reliable);

    engines[0].propose("LEADER_M1".to_string());
    settle(Duration::from_secs(1)).await;

    // Every acceptor promised with nothing accepted before.
    let promises = network.sent_of("PROMISE");
    assert_eq!(promises.len(), 2);
    for (from, to, message) in &promises {
        assert_ne!(from, "M1");
        assert_eq!(to, "M1");
        match message {
        | Message::Promise(promise) => {
            assert_eq!(promise.number, ProposalNumber::new(1, 1));
            assert_eq!(promise.prior, None);
        }
        | other => panic!("unexpected {:?}", other),
        }
    }

    // Exactly one Accept-Request broadcast, carrying M1's own value.
    let requests = network.sent_of("ACCEPT_REQUEST");
    assert_eq!(requests.len(), 2);
    for (from, _, message) in &requests {
        assert_eq!(from, "M1");
        match message {
        | Message::AcceptRequest(request) => assert_eq!(request.value, "LEADER_M1"),
        | other => panic!("unexpected {:?}", other),
        }
    }

    for decision in decisions(&engines) {
        let decision = decision.expect("every learner decides");
        assert_eq!(decision.value, "LEADER_M1");
        assert_eq!(decision.number, ProposalNumber::new(1, 1));
    }
    assert_eq!(engines[0].phase(), Phase::Decided);
}

#[tokio::test(start_paused = true)]
async fn three_members_decide_with_one_member_down() {
    let (network, engines) = council(3, Duration::from_secs(3), |_| Instant);
    network.partition("M3");

    engines[0].propose("LEADER_M1".to_string());
    settle(Duration::from_secs(1)).await;

    // M1 counts its own promise and acceptance alongside M2's.
    for engine in &engines[..2] {
        let decision = engine.decision().expect("majority reachable");
        assert_eq!(decision.value, "LEADER_M1");
        assert_eq!(decision.number, ProposalNumber::new(1, 1));
    }
    assert_eq!(engines[2].decision(), None);
    assert_eq!(engines[0].promised(), Some(ProposalNumber::new(1, 1)));
}

#[tokio::test(start_paused = true)]
async fn five_members_decide_with_two_members_down() {
    let (network, engines) = council(5, Duration::from_secs(3), |_| Instant);
    network.partition("M4");
    network.partition("M5");

    engines[1].propose("LEADER_M2".to_string());
    settle(Duration::from_secs(1)).await;

    for decision in decisions(&engines[..3]) {
        assert_eq!(decision.expect("majority reachable").value, "LEADER_M2");
    }
    assert_eq!(engines[3].decision(), None);
    assert_eq!(engines[4].decision(), None);
}

#[tokio::test(start_paused = true)]
async fn five_members_need_three_acceptances() {
    let (network, engines) = council(5, Duration::from_secs(3), |_| Instant);
    network.partition("M3");
    network.partition("M4");
    network.partition("M5");

    engines[0].propose("LEADER_M1".to_string());
    settle(Duration::from_secs(1)).await;

    // M1 and M2 promise: two of the three required.
    assert!(engines.iter().all(|engine| engine.decision().is_none()));
    assert!(network.sent_of("ACCEPT_REQUEST").is_empty());
    assert_eq!(engines[0].phase(), Phase::Preparing);
}

#[tokio::test(start_paused = true)]
async fn single_member_decides_alone() {
    let (network, engines) = council(1, Duration::from_secs(3), |_| Instant);

    engines[0].propose("SOLO".to_string());

    let decision = engines[0].decision().expect("quorum of one");
    assert_eq!(decision.value, "SOLO");
    assert_eq!(engines[0].phase(), Phase::Decided);
    assert!(network.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn five_members_decide_with_one_member_down() {
    let (network, engines) = council(5, Duration::from_secs(3), |_| Instant);
    network.partition("M5");

    engines[2].propose("LEADER_M3".to_string());
    settle(Duration::from_secs(1)).await;

    for (engine, decision) in engines.iter().zip(decisions(&engines)).take(4) {
        assert_eq!(
            decision.map(|decision| decision.value),
            Some("LEADER_M3".to_string()),
            "{} did not learn",
            engine.id(),
        );
    }
    assert_eq!(engines[4].decision(), None);
}

#[tokio::test(start_paused = true)]
async fn propose_after_decision_is_a_no_op() {
    let (network, engines) = council(3, Duration::from_secs(3), |_| Instant);

    engines[0].propose("FIRST".to_string());
    settle(Duration::from_secs(1)).await;
    let prepares = network.sent_of("PREPARE").len();

    engines[1].propose("SECOND".to_string());
    engines[0].propose("THIRD".to_string());
    settle(Duration::from_secs(10)).await;

    assert_eq!(network.sent_of("PREPARE").len(), prepares);
    for decision in decisions(&engines) {
        assert_eq!(decision.unwrap().value, "FIRST");
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_the_decision() {
    let (_network, engines) = council(3, Duration::from_secs(3), |_| Instant);
    let mut rx = engines[2].subscribe();
    assert!(rx.borrow().is_none());

    engines[0].propose("WATCHED".to_string());
    rx.changed().await.expect("engine alive");

    let decision = rx.borrow().clone().expect("decided");
    assert_eq!(decision.value, "WATCHED");
}
