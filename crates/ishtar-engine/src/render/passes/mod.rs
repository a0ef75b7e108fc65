//! The frame's passes, in the order the pipeline runs them.

mod final_pass;
mod forward;
mod geometry;
mod lighting;
mod post_process;
mod splat;
mod ssao;
mod ssao_blur;

pub use final_pass::{resolve_display, FinalPass};
pub use forward::{BlendMode, ForwardItem, ForwardPass, ForwardRenderState, ForwardShader};
pub use geometry::{
    GeometryPass, DEPTH_FORMAT, DIFFUSE_FORMAT, NORMAL_FORMAT, POSITION_FORMAT, SHININESS_FORMAT,
    SPECULAR_FORMAT, UID_FORMAT,
};
pub use lighting::{LightingPass, HDR_FORMAT, MAX_LIGHTS};
pub use post_process::PostProcessChain;
pub use splat::SplatPass;
pub use ssao::{generate_kernel, SsaoPass, KERNEL_SIZE, SSAO_FORMAT};
pub use ssao_blur::SsaoBlurPass;
