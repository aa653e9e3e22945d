use crate::models::{SpinResult, StatusMessage};
use crate::services::SpinSession;
use crate::store::{AccountStore, RequestStore};

fn spin_message(result: &SpinResult) -> String {
    if result.payout > 0 {
        format!("🎁 You got: {} (+{})", result.label, result.payout)
    } else {
        format!("🎁 You got: {}", result.label)
    }
}

/// 付费转一次
pub async fn spin_paid<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
) -> StatusMessage {
    match session.spin_paid().await {
        Ok(result) => StatusMessage::success(spin_message(&result)).with_data(&result),
        Err(e) => e.into(),
    }
}

/// 使用一次免费转盘
pub async fn spin_free<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
) -> StatusMessage {
    match session.use_free_spin().await {
        Ok(result) => StatusMessage::success(spin_message(&result)).with_data(&result),
        Err(e) => e.into(),
    }
}

/// 组合转盘：一次扣费，连续多转
pub async fn spin_bundle<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
) -> StatusMessage {
    match session.spin_bundle().await {
        Ok(results) => {
            let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
            StatusMessage::success(format!("🎁 You got: {}", labels.join(", ")))
                .with_data(&results)
        }
        Err(e) => e.into(),
    }
}

pub async fn account<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
) -> StatusMessage {
    match session.view().await {
        Ok(view) => StatusMessage::success(format!("Rs: {}", view.balance)).with_data(&view),
        Err(e) => e.into(),
    }
}
