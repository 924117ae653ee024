mod common;

use anyhow::Result;
use common::{create_account, random_currency, random_money, random_owner, test_store};
use simplebank::domain::CreateTransferParams;
use simplebank::storage::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, ListAccountsParams,
    ListEntriesParams, ListTransfersParams, StoreError,
};

#[tokio::test]
async fn test_create_and_get_account() -> Result<()> {
    let (store, _temp) = test_store().await?;

    let params = CreateAccountParams {
        owner: random_owner(),
        balance: random_money(),
        currency: random_currency(),
    };
    let account = store.create_account(params.clone()).await?;

    assert!(account.id > 0);
    assert_eq!(account.owner, params.owner);
    assert_eq!(account.balance, params.balance);
    assert_eq!(account.currency, params.currency);

    let fetched = store.get_account(account.id).await?;
    assert_eq!(fetched, account);

    Ok(())
}

#[tokio::test]
async fn test_opening_balance_is_recorded_as_entry() -> Result<()> {
    let (store, _temp) = test_store().await?;

    let funded = create_account(&store, 250).await?;
    let empty = create_account(&store, 0).await?;

    let entries = store
        .list_entries(ListEntriesParams::for_account(funded.id))
        .await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 250);

    let entries = store
        .list_entries(ListEntriesParams::for_account(empty.id))
        .await?;
    assert!(entries.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_get_missing_rows_is_not_found() -> Result<()> {
    let (store, _temp) = test_store().await?;

    assert!(matches!(
        store.get_account(999).await,
        Err(StoreError::NotFound { entity: "account", .. })
    ));
    assert!(matches!(
        store.get_entry(999).await,
        Err(StoreError::NotFound { entity: "entry", .. })
    ));
    assert!(matches!(
        store.get_transfer(999).await,
        Err(StoreError::NotFound { entity: "transfer", .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_list_accounts_by_owner_with_pagination() -> Result<()> {
    let (store, _temp) = test_store().await?;

    let owner = random_owner();
    for _ in 0..5 {
        store
            .create_account(CreateAccountParams {
                owner: owner.clone(),
                balance: 0,
                currency: random_currency(),
            })
            .await?;
    }
    create_account(&store, 0).await?;

    let all_for_owner = store
        .list_accounts(ListAccountsParams {
            owner: Some(owner.clone()),
            ..Default::default()
        })
        .await?;
    assert_eq!(all_for_owner.len(), 5);
    assert!(all_for_owner.iter().all(|a| a.owner == owner));

    let page = store
        .list_accounts(ListAccountsParams {
            owner: Some(owner.clone()),
            limit: 2,
            offset: 2,
        })
        .await?;
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, all_for_owner[2].id);
    assert_eq!(page[1].id, all_for_owner[3].id);

    let everyone = store.list_accounts(ListAccountsParams::default()).await?;
    assert_eq!(everyone.len(), 6);

    Ok(())
}

#[tokio::test]
async fn test_add_account_balance() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let account = create_account(&store, 100).await?;

    let ctx = store.context();
    let updated = store
        .exec_tx(&ctx, move |q| {
            Box::pin(async move {
                q.add_account_balance(AddAccountBalanceParams {
                    id: account.id,
                    amount: -30,
                })
                .await
            })
        })
        .await?;
    assert_eq!(updated.balance, 70);

    let missing = store
        .exec_tx(&ctx, |q| {
            Box::pin(async move {
                q.add_account_balance(AddAccountBalanceParams { id: 999, amount: 10 })
                    .await
            })
        })
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_create_entry_for_missing_account_is_not_found() -> Result<()> {
    let (store, _temp) = test_store().await?;

    let ctx = store.context();
    let result = store
        .exec_tx(&ctx, |q| {
            Box::pin(async move {
                q.create_entry(CreateEntryParams {
                    account_id: 999,
                    amount: 10,
                })
                .await
            })
        })
        .await;

    assert!(matches!(result, Err(StoreError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_create_transfer_rejects_non_positive_amount() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = create_account(&store, 100).await?;
    let b = create_account(&store, 100).await?;

    for amount in [0, -5] {
        let ctx = store.context();
        let result = store
            .exec_tx(&ctx, move |q| {
                Box::pin(async move {
                    q.create_transfer(CreateTransferParams::new(a.id, b.id, amount))
                        .await
                })
            })
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    let transfers = store.list_transfers(ListTransfersParams::default()).await?;
    assert!(transfers.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_list_transfers_filters_by_direction() -> Result<()> {
    let (store, _temp) = test_store().await?;
    let a = create_account(&store, 1_000).await?;
    let b = create_account(&store, 1_000).await?;
    let c = create_account(&store, 1_000).await?;

    let ctx = store.context();
    store
        .transfer_tx(&ctx, CreateTransferParams::new(a.id, b.id, 10))
        .await?;
    store
        .transfer_tx(&ctx, CreateTransferParams::new(a.id, c.id, 20))
        .await?;
    store
        .transfer_tx(&ctx, CreateTransferParams::new(b.id, a.id, 30))
        .await?;

    let from_a = store
        .list_transfers(ListTransfersParams {
            from_account_id: Some(a.id),
            ..Default::default()
        })
        .await?;
    assert_eq!(from_a.len(), 2);

    let a_to_b = store
        .list_transfers(ListTransfersParams {
            from_account_id: Some(a.id),
            to_account_id: Some(b.id),
            ..Default::default()
        })
        .await?;
    assert_eq!(a_to_b.len(), 1);
    assert_eq!(a_to_b[0].amount, 10);

    let into_a = store
        .list_transfers(ListTransfersParams {
            to_account_id: Some(a.id),
            ..Default::default()
        })
        .await?;
    assert_eq!(into_a.len(), 1);
    assert_eq!(into_a[0].amount, 30);

    let page = store
        .list_transfers(ListTransfersParams {
            limit: 1,
            offset: 1,
            ..Default::default()
        })
        .await?;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].amount, 20);

    Ok(())
}
