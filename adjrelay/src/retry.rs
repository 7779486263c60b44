//! Politique de réessai nommée
//!
//! Tous les délais de récupération du moteur passent par ce type plutôt que
//! par des sleeps dispersés : le backoff du superviseur et les réessais du
//! pipe writer partagent la même mécanique (délai fixe ; extensible à un
//! backoff exponentiel si le besoin apparaît).

use std::time::Duration;

/// Politique de réessai à délai fixe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Nombre maximal de tentatives (1 = pas de réessai)
    pub attempts: u32,
    /// Délai entre deux tentatives
    pub delay: Duration,
}

impl RetryPolicy {
    /// Politique à délai fixe
    pub const fn fixed(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Attend le délai de la politique
    pub async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_is_plain_data() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(250));
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }
}
