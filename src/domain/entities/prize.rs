/// A prize row from the inventory sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prize {
    pub name: String,
    pub limit: i64,
    pub issued: i64,
    /// 1-based sheet row the prize was read from
    pub row: usize,
}

impl Prize {
    pub fn remaining(&self) -> i64 {
        self.limit - self.issued
    }

    pub fn is_available(&self) -> bool {
        self.remaining() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability() {
        let prize = Prize { name: "Mug".to_string(), limit: 3, issued: 2, row: 2 };
        assert!(prize.is_available());
        assert_eq!(prize.remaining(), 1);

        let gone = Prize { issued: 3, ..prize.clone() };
        assert!(!gone.is_available());

        let overdrawn = Prize { issued: 5, ..prize };
        assert!(!overdrawn.is_available());
    }
}
