use camoscene_assets::AssetError;
use camoscene_common::EntityId;
use camoscene_kernel::SceneGraphError;
use camoscene_physics::PhysicsError;
use camoscene_render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Graph(#[from] SceneGraphError),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("entity {0:?} has no rigid body binding")]
    UnknownEntity(EntityId),
    #[error("the scene already has a camouflage object")]
    CamouflageExists,
    #[error("settings I/O: {0}")]
    SettingsIo(#[from] std::io::Error),
    #[error("settings format: {0}")]
    SettingsFormat(#[from] serde_json::Error),
}
