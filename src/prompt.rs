//! Prompt composition: fixed instruction templates plus the user's text.
//!
//! Template selection is the only computation here. The same inputs always
//! produce byte-identical output, and the user's text is appended verbatim,
//! never rewritten or truncated.

use crate::types::RenderMode;

/// Sentinel prompt value that selects the composite-finalization template.
pub const FINALIZE_COMPOSITE: &str = "[FINALIZE_COMPOSITE]";

const GENERATE_DEPTH: &str = "\
You are receiving a DEPTH MAP image:

DEPTH MAP:
- Black and white gradient representing depth
- White = closest objects, Black = farthest objects
- Shows spatial relationships and 3D structure

YOUR TASK:
1. Interpret the depth map to understand scene geometry
2. Generate photorealistic 3D render based on this structure
3. Choose appropriate materials, colors, and lighting
";

const GENERATE_DEPTH_WITH_REFERENCE: &str = "\
You are receiving TWO images with different purposes:

IMAGE 1 (Depth Map):
- Black and white gradient representing depth
- White = closest objects, Black = farthest objects
- Use for: scene composition, object placement, 3D structure
- This depth map shows the spatial layout

IMAGE 2 (Style Reference):
- Use ONLY for: color palette, material textures, lighting mood, surface details
- DO NOT copy: composition, object placement, camera angle
- Extract: visual aesthetics, aspect ratio

YOUR TASK:
1. Understand 3D scene structure from depth map (IMAGE 1)
2. Apply visual style from reference (IMAGE 2) to that structure
3. Create photorealistic render combining: depth map geometry + reference style
4. Match aspect ratio of reference image
";

const GENERATE_COLOR: &str = "\
You are receiving a LOW-QUALITY 3D RENDER that needs COMPLETE VISUAL OVERHAUL:

INPUT IMAGE (ROUGH DRAFT ONLY):
- Amateur 3D render with placeholder materials and basic lighting
- Use ONLY for general composition and object positions
- Colors are WRONG, materials are FAKE, lighting is FLAT
- This is NOT the target quality - you must COMPLETELY rebuild it

YOUR MISSION - TOTAL TRANSFORMATION:
1. REPLACE all materials with photorealistic equivalents:
   - Metal -> realistic metal with proper reflections, anisotropy, scratches
   - Plastic -> varied surface finish, subtle color variation, wear
   - Wood -> visible grain, natural color variation, texture depth
   - Glass -> proper refraction, reflections, subtle imperfections
   - Fabric -> weave patterns, soft shadows, natural draping

2. REBUILD lighting from scratch:
   - Add professional 3-point lighting or natural light sources
   - Strong shadows with soft edges
   - Realistic reflections and bounce light
   - Ambient occlusion in corners and crevices
   - Color temperature variation (warm/cool balance)

3. REIMAGINE colors:
   - Input colors are just suggestions - make them BETTER
   - Add professional color grading
   - Harmonious palette with contrast
   - Natural color variation within surfaces

4. ADD depth and atmosphere:
   - Volumetric lighting effects (god rays, haze)
   - Atmospheric perspective (depth fog)
   - Particle effects if appropriate (dust, moisture)
   - Background depth and detail

5. ENHANCE with imperfections:
   - Surface scratches, dents, wear patterns
   - Fingerprints on smooth surfaces
   - Dust accumulation in corners
   - Natural aging and weathering

CRITICAL MINDSET:
- Think: 'This is a SKETCH, not the final image'
- Your goal: 'Student work' -> 'Professional portfolio piece'
- Be BOLD with changes - the input is intentionally low quality
- Don't preserve bad materials or flat lighting
- Make every surface, light, and color DRAMATICALLY better
- Aim for: movie VFX quality or high-end product photography
";

const GENERATE_COLOR_WITH_REFERENCE: &str = "\
You are receiving TWO images:

IMAGE 1 (3D Render - ONLY for composition/layout):
- Use EXCLUSIVELY for object positions and scene layout
- IGNORE its colors, materials, lighting, and quality
- Treat this as a rough sketch, not the final look
- The render quality here is BAD - you must fix it

IMAGE 2 (Style Reference - YOUR MAIN GUIDE):
- This is your PRIMARY reference for EVERYTHING visual
- COPY AGGRESSIVELY: lighting setup, material types, color palette, texture quality, mood, atmosphere
- Study this image's visual language and REPLICATE it
- Ignore the rough render quality of IMAGE 1 - focus on IMAGE 2's style

YOUR TASK - AGGRESSIVE TRANSFORMATION:
1. Keep ONLY the composition/layout from IMAGE 1
2. COMPLETELY REPLACE materials, lighting, colors with IMAGE 2's style
3. Make materials look like IMAGE 2 (if metallic there -> metallic here)
4. Match IMAGE 2's lighting direction, intensity, and color temperature
5. Use IMAGE 2's color palette - forget IMAGE 1's colors
6. Replicate IMAGE 2's atmosphere, depth, and mood
7. Think: 'IMAGE 1 is a placeholder, IMAGE 2 is the goal'

CRITICAL - DON'T BE CONSERVATIVE:
- If IMAGE 1 is blue but IMAGE 2 is warm -> make it WARM
- If IMAGE 1 is flat but IMAGE 2 has depth -> add DEPTH
- If IMAGE 1 is simple but IMAGE 2 is detailed -> add DETAILS
- TRANSFORM aggressively, don't just 'improve' IMAGE 1
";

const EDIT_PLAIN: &str = "\
You are editing an existing render.

SOURCE IMAGE:
- The current state of the render - this is what you are modifying
- Preserve its composition, camera angle, and overall lighting
- Change ONLY what the instructions ask for; leave everything else intact

YOUR TASK:
1. Apply the requested change seamlessly
2. Match the existing lighting, perspective, and color grading
3. Keep untouched regions pixel-faithful to the source
";

const EDIT_WITH_MASK: &str = "\
You are editing an existing render with a MASK.

SOURCE IMAGE:
- The current state of the render - this is what you are modifying

MASK IMAGE:
- White marks the region you may change
- Black marks regions that MUST remain untouched
- Blend the edited region seamlessly into its surroundings

YOUR TASK:
1. Apply the requested change ONLY inside the white mask region
2. Match lighting, perspective, and color grading of the source
3. Produce no visible seam at the mask boundary
";

const EDIT_WITH_REFERENCE: &str = "\
You are editing an existing render using a REFERENCE image.

REFERENCE IMAGE:
- Supplies the object, material, or style to bring into the scene
- Extract its content and look - not its composition or camera angle

SOURCE IMAGE:
- The current state of the render - this is what you are modifying
- Preserve its composition, camera angle, and overall lighting

YOUR TASK:
1. Integrate the reference content as the instructions describe
2. Re-light the inserted content to match the source scene
3. Keep everything not involved in the edit intact
";

const EDIT_WITH_MASK_AND_REFERENCE: &str = "\
You are editing an existing render using a REFERENCE image and a MASK.

REFERENCE IMAGE:
- Supplies the object, material, or style to bring into the scene
- Extract its content and look - not its composition or camera angle

SOURCE IMAGE:
- The current state of the render - this is what you are modifying

MASK IMAGE:
- White marks the region you may change
- Black marks regions that MUST remain untouched

YOUR TASK:
1. Place the reference content ONLY inside the white mask region
2. Scale and perspective-match it to the scene geometry
3. Re-light it to match the source scene
4. Produce no visible seam at the mask boundary
";

const EDIT_FINALIZE: &str = "\
You are finalizing a composited render.

INPUT IMAGE:
- A render assembled from several edits; pieces may not match visually

YOUR TASK - UNIFY THE IMAGE:
1. Harmonize color grading across the entire image
2. Equalize contrast and exposure between composited regions
3. Unify lighting direction, intensity, and color temperature
4. Smooth any seams or edges left by earlier edits
5. Do NOT move, add, or remove any object - appearance only

The result must read as a single photograph, not a composite.
";

/// Builds the full prompt for a generate call.
///
/// The template is selected by whether a style reference is attached and
/// whether the structure image is a depth map or a color render; the user's
/// text goes at the end, verbatim.
pub fn build_generate_prompt(user_text: &str, has_reference: bool, mode: RenderMode) -> String {
    let base = match (mode, has_reference) {
        (RenderMode::DepthMap, false) => GENERATE_DEPTH,
        (RenderMode::DepthMap, true) => GENERATE_DEPTH_WITH_REFERENCE,
        (RenderMode::ColorRender, false) => GENERATE_COLOR,
        (RenderMode::ColorRender, true) => GENERATE_COLOR_WITH_REFERENCE,
    };
    append_user_text(base, user_text)
}

/// Builds the full prompt for an edit call.
///
/// The finalize sentinel selects the composite-unification template and
/// carries no user text of its own.
pub fn build_edit_prompt(user_text: &str, has_mask: bool, has_reference: bool) -> String {
    if user_text.trim() == FINALIZE_COMPOSITE {
        return EDIT_FINALIZE.to_string();
    }

    let base = match (has_mask, has_reference) {
        (false, false) => EDIT_PLAIN,
        (true, false) => EDIT_WITH_MASK,
        (false, true) => EDIT_WITH_REFERENCE,
        (true, true) => EDIT_WITH_MASK_AND_REFERENCE,
    };
    append_user_text(base, user_text)
}

fn append_user_text(base: &str, user_text: &str) -> String {
    let trimmed = user_text.trim();
    if trimmed.is_empty() {
        base.to_string()
    } else {
        format!("{base}\nUser instructions: {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_prompt_is_deterministic() {
        let a = build_generate_prompt("x", true, RenderMode::DepthMap);
        let b = build_generate_prompt("x", true, RenderMode::DepthMap);
        assert_eq!(a, b);
    }

    #[test]
    fn test_user_text_appears_verbatim_at_end() {
        let prompt = build_generate_prompt("neon rain, wet asphalt", false, RenderMode::DepthMap);
        assert!(prompt.ends_with("User instructions: neon rain, wet asphalt"));

        let prompt = build_edit_prompt("remove the chair", true, false);
        assert!(prompt.ends_with("User instructions: remove the chair"));
    }

    #[test]
    fn test_empty_user_text_yields_template_alone() {
        assert_eq!(
            build_generate_prompt("", false, RenderMode::DepthMap),
            GENERATE_DEPTH
        );
        assert_eq!(
            build_generate_prompt("   ", false, RenderMode::DepthMap),
            GENERATE_DEPTH
        );
    }

    #[test]
    fn test_generate_selects_all_four_templates() {
        let variants = [
            build_generate_prompt("", false, RenderMode::DepthMap),
            build_generate_prompt("", true, RenderMode::DepthMap),
            build_generate_prompt("", false, RenderMode::ColorRender),
            build_generate_prompt("", true, RenderMode::ColorRender),
        ];
        for (i, a) in variants.iter().enumerate() {
            for b in variants.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_edit_selects_all_four_templates() {
        let variants = [
            build_edit_prompt("", false, false),
            build_edit_prompt("", true, false),
            build_edit_prompt("", false, true),
            build_edit_prompt("", true, true),
        ];
        for (i, a) in variants.iter().enumerate() {
            for b in variants.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_mask_template_describes_mask_semantics() {
        let prompt = build_edit_prompt("paint it red", true, false);
        assert!(prompt.contains("White marks the region you may change"));
    }

    #[test]
    fn test_finalize_sentinel_selects_finalize_template() {
        let prompt = build_edit_prompt(FINALIZE_COMPOSITE, false, false);
        assert!(prompt.contains("finalizing a composited render"));
        // Sentinel itself never leaks into the prompt
        assert!(!prompt.contains(FINALIZE_COMPOSITE));
        // Flags don't change the finalize template
        assert_eq!(prompt, build_edit_prompt(FINALIZE_COMPOSITE, true, true));
    }

    #[test]
    fn test_structure_precedes_style_in_generate_templates() {
        let prompt = build_generate_prompt("", true, RenderMode::DepthMap);
        let depth_pos = prompt.find("IMAGE 1 (Depth Map)").unwrap();
        let style_pos = prompt.find("IMAGE 2 (Style Reference)").unwrap();
        assert!(depth_pos < style_pos);
    }
}
