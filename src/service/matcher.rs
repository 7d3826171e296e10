use crate::config::ReconcileConfig;
use crate::models::{AccountCounts, LedgerRow, MatchPair, PassKind, PassOutcome};
use indexmap::IndexMap;

/// 抵消判定阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    /// |正 + 负| < t
    Strict(f64),
    /// |正 + 负| <= t
    Inclusive(f64),
}

impl Tolerance {
    pub fn accepts(&self, sum: f64) -> bool {
        match *self {
            Tolerance::Strict(t) => sum.abs() < t,
            Tolerance::Inclusive(t) => sum.abs() <= t,
        }
    }
}

/// 候选池范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// 按账户分组, 组内配对
    PerAccount,
    /// 全表一个正池一个负池
    Global,
}

/// 计数策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    /// 组账户 +2
    PairToGroup,
    /// 正负两行各自账户 +1
    EachSide,
}

/// 一轮匹配的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSpec {
    pub kind: PassKind,
    pub tolerance: Tolerance,
    pub scope: Scope,
    pub counting: CountPolicy,
}

impl PassSpec {
    pub fn exact(cfg: &ReconcileConfig) -> Self {
        Self {
            kind: PassKind::Exact,
            tolerance: Tolerance::Strict(cfg.exact_tolerance),
            scope: Scope::PerAccount,
            counting: CountPolicy::PairToGroup,
        }
    }

    pub fn tolerated(cfg: &ReconcileConfig) -> Self {
        Self {
            kind: PassKind::Tolerated,
            tolerance: Tolerance::Inclusive(cfg.tolerance),
            scope: Scope::PerAccount,
            counting: CountPolicy::PairToGroup,
        }
    }

    pub fn cross_account(cfg: &ReconcileConfig) -> Self {
        Self {
            kind: PassKind::CrossAccount,
            tolerance: Tolerance::Inclusive(cfg.tolerance),
            scope: Scope::Global,
            counting: CountPolicy::EachSide,
        }
    }
}

/// 按顺序收集候选行下标, 分组保持首次出现顺序
fn candidate_groups(rows: &[LedgerRow], scope: Scope) -> IndexMap<Option<String>, Vec<usize>> {
    let mut groups: IndexMap<Option<String>, Vec<usize>> = IndexMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if !row.is_candidate() {
            continue;
        }
        let key = match scope {
            Scope::PerAccount => row.account.clone(),
            Scope::Global => None,
        };
        groups.entry(key).or_default().push(idx);
    }
    groups
}

/// 贪心首配: 每个正数行按顺序找第一个未用且在阈值内的负数行
///
/// 已处于非 Unmatched 状态的行不参与; 配对成功的两行迁移到本轮对应状态。
pub fn run_pass(rows: &mut [LedgerRow], spec: &PassSpec) -> PassOutcome {
    let mut pairs = Vec::new();
    let mut counts = AccountCounts::default();
    let state = spec.kind.state();

    for (group, members) in candidate_groups(rows, spec.scope) {
        let (positives, negatives): (Vec<usize>, Vec<usize>) = members
            .into_iter()
            .partition(|&i| rows[i].amount.is_some_and(|v| v > 0.0));
        let mut used_neg = vec![false; negatives.len()];

        for &pi in &positives {
            let pval = rows[pi].amount.unwrap_or_default();
            let hit = negatives.iter().enumerate().find(|&(ni, &nj)| {
                !used_neg[ni] && spec.tolerance.accepts(pval + rows[nj].amount.unwrap_or_default())
            });
            let Some((ni, &nj)) = hit else {
                continue;
            };

            used_neg[ni] = true;
            rows[pi].state = state;
            rows[nj].state = state;

            match spec.counting {
                CountPolicy::PairToGroup => counts.add(group.as_deref(), 2),
                CountPolicy::EachSide => {
                    counts.add(rows[pi].account.as_deref(), 1);
                    counts.add(rows[nj].account.as_deref(), 1);
                }
            }

            pairs.push(MatchPair {
                pass: spec.kind,
                positive_row: rows[pi].row,
                negative_row: rows[nj].row,
                positive_account: rows[pi].account.clone(),
                negative_account: rows[nj].account.clone(),
                positive_amount: pval,
                negative_amount: rows[nj].amount.unwrap_or_default(),
            });
        }
    }

    tracing::info!("{:?} pass: {} 对匹配", spec.kind, pairs.len());

    PassOutcome {
        pass: spec.kind,
        pairs,
        counts,
    }
}

/// 依次执行精确/容差/跨账户三轮
pub fn run_matching_passes(rows: &mut [LedgerRow], cfg: &ReconcileConfig) -> Vec<PassOutcome> {
    [
        PassSpec::exact(cfg),
        PassSpec::tolerated(cfg),
        PassSpec::cross_account(cfg),
    ]
    .iter()
    .map(|spec| run_pass(rows, spec))
    .collect()
}
