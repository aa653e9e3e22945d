use chrono::Utc;
use uuid::Uuid;

use crate::config::RequestConfig;
use crate::error::{AppError, AppResult};
use crate::models::{FundRequest, FundRequestInput, RequestKind, RequestStatus};
use crate::store::RequestStore;
use crate::utils::generate_reference;

/// Deposit and withdrawal submissions. The client never changes a request
/// after appending it and never touches the balance here.
#[derive(Clone)]
pub struct RequestService<R: RequestStore> {
    store: R,
    config: RequestConfig,
}

impl<R: RequestStore> RequestService<R> {
    pub fn new(store: R, config: RequestConfig) -> Self {
        Self { store, config }
    }

    /// 提交充值申请（由管理员人工确认到账）
    pub async fn submit_deposit(
        &self,
        account_id: &str,
        input: &FundRequestInput,
    ) -> AppResult<FundRequest> {
        Self::validate_payee(input)?;
        if input.amount < self.config.min_deposit {
            return Err(AppError::ValidationError(format!(
                "Minimum deposit is {}",
                self.config.min_deposit
            )));
        }

        let now = Utc::now();
        let request = self.build(
            account_id,
            RequestKind::Deposit,
            input,
            Some(generate_reference(account_id, now.timestamp_millis())),
        );
        self.store.append(request.clone()).await?;
        log::info!(
            "Deposit request {} ({}) of {} submitted by {account_id}",
            request.id,
            request.reference.as_deref().unwrap_or_default(),
            request.amount
        );
        Ok(request)
    }

    /// 提交提现申请。同一账户只允许一条待处理提现（客户端尽力检查）
    pub async fn submit_withdrawal(
        &self,
        account_id: &str,
        available_balance: i64,
        input: &FundRequestInput,
    ) -> AppResult<FundRequest> {
        Self::validate_payee(input)?;
        if input.amount < self.config.min_withdrawal {
            return Err(AppError::ValidationError(format!(
                "Minimum withdrawal is {}",
                self.config.min_withdrawal
            )));
        }
        if input.amount > available_balance {
            return Err(AppError::InsufficientBalance {
                required: input.amount,
                available: available_balance,
            });
        }

        let pending = self
            .store
            .query(account_id, RequestKind::Withdrawal, Some(RequestStatus::Pending))
            .await?;
        if !pending.is_empty() {
            return Err(AppError::PendingRequestExists);
        }

        let request = self.build(account_id, RequestKind::Withdrawal, input, None);
        self.store.append(request.clone()).await?;
        log::info!(
            "Withdrawal request {} of {} submitted by {account_id}",
            request.id,
            request.amount
        );
        Ok(request)
    }

    /// Own requests of one kind, newest first.
    pub async fn history(
        &self,
        account_id: &str,
        kind: RequestKind,
        status: Option<RequestStatus>,
    ) -> AppResult<Vec<FundRequest>> {
        let mut requests = self.store.query(account_id, kind, status).await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    fn validate_payee(input: &FundRequestInput) -> AppResult<()> {
        if input.account_holder.trim().is_empty() {
            return Err(AppError::ValidationError("Account holder name is required".into()));
        }
        if input.account_number.trim().is_empty() {
            return Err(AppError::ValidationError("Account number is required".into()));
        }
        Ok(())
    }

    fn build(
        &self,
        account_id: &str,
        kind: RequestKind,
        input: &FundRequestInput,
        reference: Option<String>,
    ) -> FundRequest {
        FundRequest {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            kind,
            amount: input.amount,
            account_holder: input.account_holder.trim().to_string(),
            account_number: input.account_number.trim().to_string(),
            method: self.config.payment_method.clone(),
            reference,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service(store: &MemoryStore) -> RequestService<MemoryStore> {
        RequestService::new(store.clone(), RequestConfig::default())
    }

    fn input(amount: i64) -> FundRequestInput {
        FundRequestInput {
            account_holder: "Ali Khan".into(),
            account_number: "03001234567".into(),
            amount,
        }
    }

    #[tokio::test]
    async fn test_deposit_gets_reference_and_pending_status() {
        let store = MemoryStore::new();
        let request = service(&store)
            .submit_deposit("account-123456", &input(500))
            .await
            .unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.method, "Easypaisa");
        assert!(request.reference.unwrap().starts_with("REF-accoun-"));
    }

    #[tokio::test]
    async fn test_deposit_validation() {
        let store = MemoryStore::new();
        let svc = service(&store);
        assert!(matches!(
            svc.submit_deposit("u1", &input(5)).await,
            Err(AppError::ValidationError(_))
        ));
        let mut blank = input(100);
        blank.account_holder = "   ".into();
        assert!(svc.submit_deposit("u1", &blank).await.is_err());
        assert!(svc.history("u1", RequestKind::Deposit, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_limits() {
        let store = MemoryStore::new();
        let svc = service(&store);
        assert!(matches!(
            svc.submit_withdrawal("u1", 5000, &input(999)).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            svc.submit_withdrawal("u1", 1200, &input(1500)).await,
            Err(AppError::InsufficientBalance { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_pending_withdrawal_rejected() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let first = svc.submit_withdrawal("u1", 5000, &input(1000)).await.unwrap();
        assert!(first.reference.is_none());
        assert!(matches!(
            svc.submit_withdrawal("u1", 5000, &input(1000)).await,
            Err(AppError::PendingRequestExists)
        ));
        // 其他账户不受影响
        assert!(svc.submit_withdrawal("u2", 5000, &input(1000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let older = svc.submit_deposit("u1", &input(100)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = svc.submit_deposit("u1", &input(200)).await.unwrap();

        let history = svc.history("u1", RequestKind::Deposit, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, newer.id);
        assert_eq!(history[1].id, older.id);
    }
}
