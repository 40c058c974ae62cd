use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 貸出ID - 貸出台帳の行ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

/// 書籍ID - 蔵書（タイトル）単位のID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 複本ID - 貸出可能な1冊ごとのID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CopyId(Uuid);

impl CopyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for CopyId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者ID - 貸出を保持できるアカウント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorrowerId(Uuid);

impl BorrowerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BorrowerId {
    fn default() -> Self {
        Self::new()
    }
}

/// 複本の貸出状態
///
/// 不変条件：`OnLoan`であることと、未返却の貸出がちょうど1件存在することは同値。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyState {
    /// 貸出可能
    Available,
    /// 貸出中
    OnLoan,
}

impl CopyState {
    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyState::Available => "available",
            CopyState::OnLoan => "on_loan",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CopyState::Available)
    }
}

impl std::str::FromStr for CopyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(CopyState::Available),
            "on_loan" => Ok(CopyState::OnLoan),
            _ => Err(format!("Invalid copy state: {}", s)),
        }
    }
}

/// 利用者の権限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowerRole {
    /// 一般利用者
    User,
    /// 管理者（蔵書の追加・削除が可能）
    Admin,
}

impl BorrowerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowerRole::User => "user",
            BorrowerRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, BorrowerRole::Admin)
    }
}

impl std::str::FromStr for BorrowerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(BorrowerRole::User),
            "admin" => Ok(BorrowerRole::Admin),
            _ => Err(format!("Invalid borrower role: {}", s)),
        }
    }
}
