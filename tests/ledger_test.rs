mod common;

use aggie::application::{AppError, RECENT_TRANSACTIONS};
use aggie::domain::{Role, TransactionKind, apply};
use aggie::storage::{CommitOutcome, Repository};
use anyhow::Result;
use chrono::Utc;
use common::{Campus, test_service};

#[tokio::test]
async fn test_deposit_then_withdraw_updates_balance_and_history() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let amy = Campus::login_student(&service, "amy").await?;

    assert_eq!(service.balance(&amy).await?, 0);

    let deposit = service.deposit(&amy, 10000).await?;
    assert_eq!(
        deposit.notice,
        "Deposit successful. Your new balance has been saved."
    );
    assert_eq!(deposit.record.old_balance, 0);
    assert_eq!(deposit.record.new_balance, 10000);
    assert_eq!(deposit.record.kind, TransactionKind::Deposit);
    assert_eq!(deposit.record.role, Role::Student);

    let withdrawal = service.withdraw(&amy, 2550).await?;
    assert_eq!(
        withdrawal.notice,
        "Withdrawal successful. Your new balance has been saved."
    );
    assert_eq!(withdrawal.record.old_balance, 10000);
    assert_eq!(withdrawal.record.new_balance, 7450);

    assert_eq!(service.balance(&amy).await?, 7450);

    let history = service.recent_transactions(&amy, RECENT_TRANSACTIONS).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, TransactionKind::Withdrawal);
    assert_eq!(history[1].kind, TransactionKind::Deposit);
    assert!(history[0].sequence > history[1].sequence);

    Ok(())
}

#[tokio::test]
async fn test_overdraw_is_rejected_and_nothing_is_written() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let amy = Campus::login_student(&service, "amy").await?;

    service.deposit(&amy, 5000).await?;

    let err = service.withdraw(&amy, 5001).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientFunds {
            balance: 5000,
            requested: 5001
        }
    ));
    assert_eq!(
        err.to_string(),
        "Cannot withdraw more than your current balance."
    );
    assert!(err.detail().is_some());

    assert_eq!(service.balance(&amy).await?, 5000);
    assert_eq!(service.recent_transactions(&amy, 10).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_withdrawing_entire_balance_leaves_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let amy = Campus::login_student(&service, "amy").await?;

    service.deposit(&amy, 1234).await?;
    let result = service.withdraw(&amy, 1234).await?;
    assert_eq!(result.record.new_balance, 0);
    assert_eq!(service.balance(&amy).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let amy = Campus::login_student(&service, "amy").await?;

    let err = service.deposit(&amy, 0).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidAmount {
            kind: TransactionKind::Deposit,
            amount: 0
        }
    ));
    assert_eq!(err.to_string(), "Enter a deposit amount greater than 0.");

    let err = service.withdraw(&amy, -100).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidAmount {
            kind: TransactionKind::Withdrawal,
            amount: -100
        }
    ));
    assert_eq!(err.to_string(), "Enter a withdrawal amount greater than 0.");
    assert!(service.recent_transactions(&amy, 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_finance_is_student_only() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let smith = Campus::login_faculty(&service, "rsmith").await?;

    assert!(matches!(
        service.deposit(&smith, 100).await,
        Err(AppError::WrongRole(Role::Student))
    ));
    assert!(matches!(
        service.balance(&smith).await,
        Err(AppError::WrongRole(Role::Student))
    ));

    Ok(())
}

#[tokio::test]
async fn test_recent_transactions_respects_limit_and_owner() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let amy = Campus::login_student(&service, "amy").await?;
    let ben = Campus::login_student(&service, "ben").await?;

    for amount in 1..=7 {
        service.deposit(&amy, amount * 100).await?;
    }
    service.deposit(&ben, 999).await?;

    let recent = service.recent_transactions(&amy, RECENT_TRANSACTIONS).await?;
    assert_eq!(recent.len(), 5);
    assert!(recent.iter().all(|r| r.username == "amy"));
    assert_eq!(recent[0].amount_cents, 700);
    assert_eq!(recent[4].amount_cents, 300);

    // Every record chains: old balance of one is new balance of the previous
    let all = service.recent_transactions(&amy, 100).await?;
    for pair in all.windows(2) {
        assert_eq!(pair[0].old_balance, pair[1].new_balance);
    }
    assert_eq!(service.balance(&amy).await?, all[0].new_balance);

    Ok(())
}

#[tokio::test]
async fn test_stale_balance_commit_is_rolled_back() -> Result<()> {
    let temp = tempfile::TempDir::new()?;
    let db_path = temp.path().join("stale.db");
    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    let repo = Repository::init(&url).await?;

    repo.save_student(&aggie::domain::Student::new("amy", "pw").with_balance(1000))
        .await?;

    // Computed against a balance that is no longer current
    let (_, mut record) = apply(
        "amy",
        Role::Student,
        500,
        100,
        TransactionKind::Deposit,
        Utc::now(),
    )?;
    let outcome = repo.commit_ledger_mutation(&mut record).await?;
    assert_eq!(outcome, CommitOutcome::StaleBalance);

    let amy = repo.get_student("amy").await?.unwrap();
    assert_eq!(amy.account_balance, 1000);
    assert!(repo.list_transactions_for_user("amy").await?.is_empty());

    // Against the current balance the same mutation commits
    let (_, mut record) = apply(
        "amy",
        Role::Student,
        1000,
        100,
        TransactionKind::Deposit,
        Utc::now(),
    )?;
    assert_eq!(
        repo.commit_ledger_mutation(&mut record).await?,
        CommitOutcome::Committed
    );
    assert!(record.sequence > 0);
    assert_eq!(repo.get_student("amy").await?.unwrap().account_balance, 1100);

    Ok(())
}

#[tokio::test]
async fn test_repeated_deposit_records_twice() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Campus::seed(&service).await?;
    let ben = Campus::login_student(&service, "ben").await?;

    let first = service.deposit(&ben, 5000).await?;
    let second = service.deposit(&ben, 5000).await?;
    assert_ne!(first.record.id, second.record.id);
    assert_eq!(second.record.old_balance, 5000);
    assert_eq!(service.balance(&ben).await?, 10000);
    assert_eq!(service.recent_transactions(&ben, 10).await?.len(), 2);

    Ok(())
}
