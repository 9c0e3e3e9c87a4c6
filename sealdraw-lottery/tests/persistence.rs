mod common;

use common::{Harness, END, PURCHASE_END};
use sealdraw_core::{Amount, FungibleToken, Storage, TokenStore};
use sealdraw_lottery::{
    commit, AdminAuthority, LotteryEvent, LotteryParams, LotteryRegistry, LotteryState, Secret,
    SqliteStore, TicketSales, WinnerSelection,
};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn sqlite_state_survives_reopen() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("sealdraw.db");
    let secret = Secret::from(77u64);

    let (alice, token_address) = {
        let storage = Arc::new(Storage::new(&db_path).unwrap());
        let h = Harness::with_store(Arc::new(SqliteStore::new(storage.clone())));
        let id = h
            .engine
            .create_lottery(h.owner, LotteryParams::new(END, 32, 2, 20, Amount::new(10)))
            .unwrap();
        let alice = h.funded_buyer("alice", 1_000);
        h.engine.buy_tickets(alice, id, 7, commit(&secret)).unwrap();

        TokenStore::new(&storage)
            .save_token(&h.token.snapshot())
            .unwrap();
        (alice, h.token.address())
    };

    let storage = Arc::new(Storage::new(&db_path).unwrap());
    let snapshots = TokenStore::new(&storage).load_tokens().unwrap();
    assert_eq!(snapshots.len(), 1);

    let h = Harness::with_store(Arc::new(SqliteStore::new(storage)));
    assert_eq!(h.engine.payment_token().unwrap(), Some(token_address));
    assert_eq!(h.engine.current_lottery_no().unwrap(), 1);
    assert_eq!(h.engine.lottery_sales(1).unwrap(), 7);
    assert_eq!(h.engine.tickets_of(1, alice).unwrap()[0].start_ticket, 1);

    h.clock.set(PURCHASE_END + 1);
    h.engine.reveal_secret(alice, 1, 1, 7, secret).unwrap();
    h.clock.set(END);
    assert_eq!(
        h.engine.finalize_lottery(alice, 1).unwrap(),
        LotteryState::Finalized
    );

    let kinds: Vec<&str> = h
        .engine
        .events_since(0)
        .unwrap()
        .iter()
        .map(|record| record.event.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "PaymentTokenUpdated",
            "LotteryCreated",
            "TicketPurchased",
            "RandomNumberRevealed",
            "LotteryFinalized",
        ]
    );

    let tail = h.engine.events_since(4).unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].seq, 5);
    assert!(matches!(
        tail[0].event,
        LotteryEvent::LotteryFinalized { lottery_id: 1, .. }
    ));
}
