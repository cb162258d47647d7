/**
 * Responsibility
 *  - リソースごとの「意味付きID型」を宣言する
 *  - decode ロジック / extractor 実装はここに置かない
 */
use super::core::PublicId;

// tasks
pub enum TaskTag {}
pub type PublicTaskId = PublicId<TaskTag>;
