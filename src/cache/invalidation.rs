//! Which collections each write makes stale.
//!
//! Coherence is per collection, not per view: a mutation marks every cached
//! variant of the collections listed here, whatever filter they were fetched
//! with and whichever view did the write.

use super::key::Collection;

/// Every write the dashboard performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
  CreateTask,
  UpdateTaskStatus,
  DeleteTask,
  LogHabit,
  CreateMeal,
  CreateReflection,
  UpdateSettings,
  UpdateProfile,
  CreateMemoryEvent,
  CreateContact,
  CreateNurtureCycle,
  UpdateNurtureCycle,
  CreateSkinProduct,
  UpdateSkinProduct,
  CreateSkinLog,
}

impl Mutation {
  #[cfg(test)]
  pub const ALL: &'static [Mutation] = &[
    Self::CreateTask,
    Self::UpdateTaskStatus,
    Self::DeleteTask,
    Self::LogHabit,
    Self::CreateMeal,
    Self::CreateReflection,
    Self::UpdateSettings,
    Self::UpdateProfile,
    Self::CreateMemoryEvent,
    Self::CreateContact,
    Self::CreateNurtureCycle,
    Self::UpdateNurtureCycle,
    Self::CreateSkinProduct,
    Self::UpdateSkinProduct,
    Self::CreateSkinLog,
  ];

  /// Collections to invalidate once this mutation succeeds.
  pub fn invalidates(self) -> &'static [Collection] {
    use Collection as C;
    match self {
      Self::CreateTask | Self::UpdateTaskStatus | Self::DeleteTask => &[C::Tasks],
      Self::LogHabit => &[C::Habits],
      Self::CreateMeal => &[C::Meals],
      // Reflections are generated on demand and never cached
      Self::CreateReflection => &[],
      Self::UpdateSettings => &[C::Settings],
      Self::UpdateProfile => &[C::Profile],
      Self::CreateMemoryEvent => &[C::MemoryEvents],
      Self::CreateContact => &[C::Contacts],
      Self::CreateNurtureCycle | Self::UpdateNurtureCycle => &[C::NurtureCycles],
      Self::CreateSkinProduct | Self::UpdateSkinProduct => &[C::SkinProducts],
      Self::CreateSkinLog => &[C::SkinLogs],
    }
  }
}
